//! Decorators that record metrics around any `ToolRuntime`/`Validator`
//! (spec §6 "counts of tool executions by tool and outcome", "validator
//! verdict counts") - the same wrap-don't-replace shape as
//! `axis_pipeline::CachingPlanner`.

use std::sync::Arc;

use async_trait::async_trait;
use axis_pipeline::{ExecuteOutcome, ExecuteRequest, PipelineError, ToolRuntime, Validator};
use axis_types::{StrippedPlan, ValidationResult, Verdict};

use crate::metrics::MetricsCollector;

fn verdict_name(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Approved => "approved",
        Verdict::NeedsRevision => "needs_revision",
        Verdict::NeedsUserApproval => "needs_user_approval",
        Verdict::Rejected => "rejected",
    }
}

pub struct MetricsRecordingToolRuntime {
    inner: Arc<dyn ToolRuntime>,
    metrics: Arc<MetricsCollector>,
}

impl MetricsRecordingToolRuntime {
    pub fn new(inner: Arc<dyn ToolRuntime>, metrics: Arc<MetricsCollector>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl ToolRuntime for MetricsRecordingToolRuntime {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError> {
        let gear = request.gear.clone();
        let result = self.inner.execute(request).await;

        let outcome = match &result {
            Ok(ExecuteOutcome::Ok { .. }) => "ok",
            Ok(ExecuteOutcome::Err { .. }) => "error",
            Err(_) => "error",
        };
        self.metrics.record_tool_execution(&gear, outcome);

        result
    }
}

pub struct MetricsRecordingValidator {
    inner: Arc<dyn Validator>,
    metrics: Arc<MetricsCollector>,
}

impl MetricsRecordingValidator {
    pub fn new(inner: Arc<dyn Validator>, metrics: Arc<MetricsCollector>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl Validator for MetricsRecordingValidator {
    async fn validate(&self, stripped: StrippedPlan) -> Result<ValidationResult, PipelineError> {
        let result = self.inner.validate(stripped).await;
        if let Ok(validation) = &result {
            self.metrics.record_validator_verdict(verdict_name(validation.verdict));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_queue::store::InMemoryJobStore;
    use axis_types::{JobId, RiskLevel};
    use std::collections::HashMap;

    struct FixedToolRuntime;

    #[async_trait]
    impl ToolRuntime for FixedToolRuntime {
        async fn execute(&self, _request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError> {
            Ok(ExecuteOutcome::Ok { result: serde_json::json!({}), duration_ms: 1 })
        }
    }

    struct FixedValidator;

    #[async_trait]
    impl Validator for FixedValidator {
        async fn validate(&self, _stripped: StrippedPlan) -> Result<ValidationResult, PipelineError> {
            Ok(ValidationResult { verdict: Verdict::Approved, overall_risk: RiskLevel::Low, steps: vec![] })
        }
    }

    #[tokio::test]
    async fn tool_execution_is_recorded_with_its_gear_and_outcome() {
        let metrics = Arc::new(MetricsCollector::new(Arc::new(InMemoryJobStore::new())));
        let runtime = MetricsRecordingToolRuntime::new(Arc::new(FixedToolRuntime), metrics.clone());

        runtime
            .execute(ExecuteRequest { gear: "file-manager".into(), action: "read_file".into(), parameters: HashMap::new(), step_id: "s1".into() })
            .await
            .unwrap();

        assert_eq!(metrics.snapshot().tool_execution_counts.get("file-manager:ok"), Some(&1));
    }

    #[tokio::test]
    async fn validator_verdict_is_recorded() {
        let metrics = Arc::new(MetricsCollector::new(Arc::new(InMemoryJobStore::new())));
        let validator = MetricsRecordingValidator::new(Arc::new(FixedValidator), metrics.clone());

        validator
            .validate(StrippedPlan { id: "p1".into(), job_id: JobId::new(), steps: vec![] })
            .await
            .unwrap();

        assert_eq!(metrics.snapshot().validator_verdict_counts.get("approved"), Some(&1));
    }
}
