//! `Planner`/`Validator`/`MemoryWriter` implemented by dispatching signed
//! envelopes through `axis_router::Router` to a registered component id
//! (spec §6 "Planner, validator, memory writer (consumed)") - the
//! Router-backed counterpart to `axis_pipeline::RuleBasedValidator`'s
//! in-process one.

use std::sync::Arc;

use async_trait::async_trait;
use axis_pipeline::{ExecuteOutcome, ExecuteRequest, MemoryWriter, PipelineError, PlanRequest, Planner, ReflectRequest, ToolRuntime, Validator};
use axis_router::Router;
use axis_types::{AxisMessage, JobId, PlannerReply, StrippedPlan, ValidationResult};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Signs and dispatches one request/reply round trip to `target` as
/// `self_id`. Router dispatch has no cancellation hook of its own (the
/// `Planner`/`Validator`/`MemoryWriter` traits don't carry one - the
/// orchestrator checks its cancel token before each dispatch point
/// instead of mid-flight), so every call passes a token that is never
/// cancelled.
async fn dispatch(
    router: &Router,
    signing_key: &SigningKey,
    self_id: &str,
    target: &str,
    message_type: &str,
    job_id: Option<JobId>,
    payload: serde_json::Value,
) -> Result<String, String> {
    let message_id = Uuid::new_v4().to_string();
    let message = AxisMessage {
        id: message_id.clone(),
        correlation_id: message_id.clone(),
        timestamp: Utc::now(),
        from: self_id.to_string(),
        to: target.to_string(),
        message_type: message_type.to_string(),
        payload,
        job_id,
        reply_to: None,
    };
    let body = serde_json::to_string(&message).map_err(|e| e.to_string())?;
    let envelope = axis_router::sign_envelope(signing_key, self_id, message_id, body);
    router.dispatch(envelope, CancellationToken::new()).await.map_err(|e| e.to_string())
}

pub struct RouterDispatchedPlanner {
    router: Arc<Router>,
    signing_key: SigningKey,
    self_id: String,
    target: String,
}

impl RouterDispatchedPlanner {
    pub fn new(router: Arc<Router>, signing_key: SigningKey, self_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self { router, signing_key, self_id: self_id.into(), target: target.into() }
    }
}

#[async_trait]
impl Planner for RouterDispatchedPlanner {
    async fn plan(&self, request: PlanRequest) -> Result<PlannerReply, PipelineError> {
        let payload = serde_json::json!({
            "userMessage": request.user_message,
            "jobId": request.job_id,
            "conversationHistory": request.conversation_history,
            "relevantMemories": request.relevant_memories,
            "activeJobs": request.active_jobs,
            "failureState": {
                "revisionCount": request.failure_state.revision_count,
                "fastPathRetryCount": request.failure_state.fast_path_retry_count,
                "forceFullPath": request.failure_state.force_full_path,
            },
            "cumulativeTokens": request.cumulative_tokens,
        });

        let reply = dispatch(&self.router, &self.signing_key, &self.self_id, &self.target, "plan.request", Some(request.job_id), payload)
            .await
            .map_err(PipelineError::Planner)?;

        serde_json::from_str(&reply).map_err(|e| PipelineError::Planner(e.to_string()))
    }
}

pub struct RouterDispatchedValidator {
    router: Arc<Router>,
    signing_key: SigningKey,
    self_id: String,
    target: String,
}

impl RouterDispatchedValidator {
    pub fn new(router: Arc<Router>, signing_key: SigningKey, self_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self { router, signing_key, self_id: self_id.into(), target: target.into() }
    }
}

#[async_trait]
impl Validator for RouterDispatchedValidator {
    async fn validate(&self, stripped: StrippedPlan) -> Result<ValidationResult, PipelineError> {
        // Deliberately only the stripped plan - the information barrier
        // (spec §4.3 step 3) means no conversation or memory content ever
        // reaches this payload. `barrier::enforce` is the runtime check
        // behind `StrippedPlan`'s type-level stripping, run again here since
        // this is the point the payload actually leaves the process.
        let job_id = stripped.job_id;
        let mut payload = serde_json::json!({
            "id": stripped.id,
            "jobId": stripped.job_id,
            "steps": stripped.steps,
        });
        if let Some(object) = payload.as_object_mut() {
            axis_pipeline::barrier::enforce(object);
        }

        let reply = dispatch(&self.router, &self.signing_key, &self.self_id, &self.target, "validate.request", Some(job_id), payload)
            .await
            .map_err(PipelineError::Validator)?;

        serde_json::from_str(&reply).map_err(|e| PipelineError::Validator(e.to_string()))
    }
}

pub struct RouterDispatchedMemoryWriter {
    router: Arc<Router>,
    signing_key: SigningKey,
    self_id: String,
    target: String,
}

impl RouterDispatchedMemoryWriter {
    pub fn new(router: Arc<Router>, signing_key: SigningKey, self_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self { router, signing_key, self_id: self_id.into(), target: target.into() }
    }
}

#[async_trait]
impl MemoryWriter for RouterDispatchedMemoryWriter {
    async fn reflect(&self, request: ReflectRequest) -> Result<(), PipelineError> {
        let payload = serde_json::json!({
            "jobId": request.job_id,
            "summary": request.summary,
            "outcome": request.outcome,
        });

        dispatch(&self.router, &self.signing_key, &self.self_id, &self.target, "reflect.request", Some(request.job_id), payload)
            .await
            .map_err(PipelineError::MemoryWriter)?;

        Ok(())
    }
}

/// The tool runtime is dispatched the same way (spec §6 "Tool runtime
/// (consumed)"), except the registered handler is typically the sandbox
/// supervisor itself (see `sandbox_tool_runtime`) rather than a remote
/// component - this variant exists for a tool runtime registered as an
/// ordinary `axis_router::Handler`, e.g. a test double or an in-process
/// built-in tool that doesn't warrant its own child process.
pub struct RouterDispatchedToolRuntime {
    router: Arc<Router>,
    signing_key: SigningKey,
    self_id: String,
    target: String,
}

impl RouterDispatchedToolRuntime {
    pub fn new(router: Arc<Router>, signing_key: SigningKey, self_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self { router, signing_key, self_id: self_id.into(), target: target.into() }
    }
}

#[async_trait]
impl ToolRuntime for RouterDispatchedToolRuntime {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError> {
        let payload = serde_json::json!({
            "gear": request.gear,
            "action": request.action,
            "parameters": request.parameters,
            "stepId": request.step_id,
        });

        let reply = dispatch(&self.router, &self.signing_key, &self.self_id, &self.target, "execute.request", None, payload)
            .await
            .map_err(PipelineError::ToolRuntime)?;

        serde_json::from_str(&reply).map_err(|e| PipelineError::ToolRuntime(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_router::{AuditWriter, Handler, KeyRegistry, NullAuditWriter, ReplayWindow};
    use axis_types::{ExecutionPlan, RiskLevel, SignedEnvelope};
    use rand_core::OsRng;
    use std::collections::HashMap;
    use std::sync::Arc as StdArc;

    struct EchoPlanReply;

    #[async_trait]
    impl Handler for EchoPlanReply {
        async fn handle(&self, envelope: &SignedEnvelope, _cancel: CancellationToken) -> Result<String, String> {
            let message = envelope.decode_payload().map_err(|e| e.to_string())?;
            let job_id: JobId = serde_json::from_value(message.payload["jobId"].clone()).map_err(|e| e.to_string())?;
            let reply = PlannerReply::Full {
                plan: ExecutionPlan {
                    id: "p1".into(),
                    job_id,
                    steps: vec![axis_types::Step {
                        id: "s1".into(),
                        gear: "file-manager".into(),
                        action: "read_file".into(),
                        parameters: HashMap::new(),
                        risk_level: RiskLevel::Low,
                        description: None,
                        journal_skip: None,
                        metadata: HashMap::new(),
                    }],
                    reasoning: None,
                    metadata: HashMap::new(),
                },
            };
            Ok(serde_json::to_string(&reply).unwrap())
        }
    }

    fn router_with_planner() -> (Router, SigningKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let keys = KeyRegistry::new();
        keys.register("axis-core", signing_key.verifying_key());
        let mut router = Router::new(keys, ReplayWindow::new(60_000, 1_000), StdArc::new(NullAuditWriter) as StdArc<dyn AuditWriter>);
        router.register("planner", StdArc::new(EchoPlanReply));
        (router, signing_key)
    }

    #[tokio::test]
    async fn planner_round_trips_through_the_router() {
        let (router, signing_key) = router_with_planner();
        let planner = RouterDispatchedPlanner::new(StdArc::new(router), signing_key, "axis-core", "planner");

        let request = PlanRequest {
            user_message: "hi".into(),
            job_id: JobId::new(),
            source: axis_types::JobSource::User,
            conversation_history: serde_json::Value::Null,
            relevant_memories: serde_json::Value::Null,
            active_jobs: serde_json::Value::Null,
            failure_state: Default::default(),
            cumulative_tokens: 0,
        };

        let reply = planner.plan(request).await.unwrap();
        assert!(matches!(reply, PlannerReply::Full { .. }));
    }
}
