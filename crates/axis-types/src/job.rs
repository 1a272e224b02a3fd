use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AxisError;
use crate::job_id::JobId;
use crate::plan::ExecutionPlan;
use crate::validation::ValidationResult;

/// Where a Job originated. Affects scheduling nothing directly, but gates
/// plan-replay-cache eligibility (only `Schedule` jobs are cacheable, §4.8)
/// and appears on audit entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    User,
    Schedule,
    Webhook,
    SubJob,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// A Job's position in the state machine (spec §4.1). Ordered roughly by
/// pipeline stage so `status as u8`-style comparisons read naturally, though
/// no code should rely on that ordering for transition legality - see
/// `axis-queue`'s transition table for the source of truth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Planning,
    Validating,
    AwaitingApproval,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are never mutated again (the audit invariant in
    /// spec §4.1's Lifecycle note).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Planning => "planning",
            JobStatus::Validating => "validating",
            JobStatus::AwaitingApproval => "awaiting_approval",
            JobStatus::Executing => "executing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of one executed step, accumulated onto the Job as the pipeline
/// runs (spec §4.3 step 5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub output: serde_json::Value,
    pub duration_ms: u64,
    pub attempt: u32,
}

/// Options accepted by `createJob` (spec §4.1).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateJobOptions {
    pub source: JobSourceOrDefault,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub parent_job_id: Option<JobId>,
    #[serde(default)]
    pub dedup_fingerprint: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Thin wrapper so `CreateJobOptions` can `#[derive(Default)]` even though
/// `JobSource` itself has no natural default (every Job must declare one).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSourceOrDefault(pub JobSource);

impl Default for JobSourceOrDefault {
    fn default() -> Self {
        JobSourceOrDefault(JobSource::User)
    }
}

/// The unit of work (spec §3 "Job"). Populated progressively by the
/// pipeline; once `status.is_terminal()`, no field may change again.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub source: JobSource,
    pub priority: Priority,
    pub parent_job_id: Option<JobId>,
    pub dedup_fingerprint: Option<String>,
    pub max_attempts: u32,
    pub timeout_ms: u64,
    pub metadata: HashMap<String, serde_json::Value>,

    pub plan: Option<ExecutionPlan>,
    pub validation: Option<ValidationResult>,
    pub result: Vec<StepResult>,
    pub error: Option<AxisError>,

    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(options: CreateJobOptions) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            source: options.source.0,
            priority: options.priority,
            parent_job_id: options.parent_job_id,
            dedup_fingerprint: options.dedup_fingerprint,
            max_attempts: options.max_attempts.unwrap_or(3),
            timeout_ms: options.timeout_ms.unwrap_or(120_000),
            metadata: options.metadata,
            plan: None,
            validation: None,
            result: Vec::new(),
            error: None,
            claimed_by: None,
            claimed_at: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
