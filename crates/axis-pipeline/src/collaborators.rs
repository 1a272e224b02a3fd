//! The orchestrator's external collaborators (spec §6 "Planner,
//! validator, memory writer", "Tool runtime"): trait-object seams so the
//! orchestrator stays ignorant of how a handler is actually reached
//! (directly in-process, or via `axis-router::Router::dispatch` wrapping
//! a signed envelope) - the same separation the teacher keeps between
//! `RecoveryManagement` and the services it calls through trait objects.

use std::collections::HashMap;

use async_trait::async_trait;
use axis_types::{JobId, JobSource, PlannerReply, StrippedPlan, ValidationResult};
use serde_json::Value;

use crate::error::PipelineError;

/// Carried state across fast-path/revision retries within one Job's
/// planning stage (spec §4.3 step 1's `failureState`).
#[derive(Clone, Debug, Default)]
pub struct FailureState {
    pub revision_count: u32,
    pub fast_path_retry_count: u32,
    pub force_full_path: bool,
}

#[derive(Clone, Debug)]
pub struct PlanRequest {
    pub user_message: String,
    pub job_id: JobId,
    pub source: JobSource,
    pub conversation_history: Value,
    pub relevant_memories: Value,
    pub active_jobs: Value,
    pub failure_state: FailureState,
    pub cumulative_tokens: u64,
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: PlanRequest) -> Result<PlannerReply, PipelineError>;
}

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, stripped: StrippedPlan) -> Result<ValidationResult, PipelineError>;
}

#[derive(Clone, Debug)]
pub struct ExecuteRequest {
    pub gear: String,
    pub action: String,
    pub parameters: HashMap<String, Value>,
    pub step_id: String,
}

#[derive(Clone, Debug)]
pub enum ExecuteOutcome {
    Ok { result: Value, duration_ms: u64 },
    Err { code: String, message: String, retriable: bool },
}

#[async_trait]
pub trait ToolRuntime: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError>;
}

#[derive(Clone, Debug)]
pub struct ReflectRequest {
    pub job_id: JobId,
    pub summary: Value,
    pub outcome: Value,
}

#[async_trait]
pub trait MemoryWriter: Send + Sync {
    async fn reflect(&self, request: ReflectRequest) -> Result<(), PipelineError>;
}
