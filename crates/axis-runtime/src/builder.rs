//! `AxisBuilder` wires every crate together into a running `Axis` (spec
//! §3.8 "main.rs wires every crate through an explicit builder"):
//! dependencies always flow parent-to-child, never the reverse.

use std::sync::Arc;

use axis_cache::{ReplayCache, ReplayCacheConfig};
use axis_pipeline::{CachingPlanner, MemoryWriter, Pipeline, PipelineConfig, Planner, ToolRuntime, Validator};
use axis_queue::store::{InMemoryJobStore, JobStore};
use axis_router::{AuditWriter, KeyRegistry, NullAuditWriter, ReplayWindow, Router};
use ed25519_dalek::SigningKey;

use crate::config::AxisConfig;
use crate::lifecycle::LifecycleManager;
use crate::metrics::MetricsCollector;
use crate::metrics_collaborators::{MetricsRecordingToolRuntime, MetricsRecordingValidator};
use crate::worker_pool::{WorkerPool, WorkerPoolConfig};

/// Everything a running instance needs held alive.
pub struct Axis {
    pub config: AxisConfig,
    pub queue: Arc<dyn JobStore>,
    pub router: Arc<Router>,
    pub metrics: Arc<MetricsCollector>,
    pub pipeline: Arc<Pipeline>,
    pub worker_pool: Arc<WorkerPool>,
    pub lifecycle: Arc<LifecycleManager>,
}

/// Builds an [`Axis`] from a config plus the three pluggable collaborators
/// (planner, validator, tool runtime, memory writer) an external component
/// set provides. Accepts `Arc<dyn ...>` rather than concrete types so a
/// caller can hand in either the Router-dispatched adapters
/// (`router_collaborators`) or test doubles, uniformly.
pub struct AxisBuilder {
    config: AxisConfig,
    signing_key: SigningKey,
    self_id: String,
    router: Option<Arc<Router>>,
    planner: Option<Arc<dyn Planner>>,
    validator: Option<Arc<dyn Validator>>,
    tool_runtime: Option<Arc<dyn ToolRuntime>>,
    memory_writer: Option<Arc<dyn MemoryWriter>>,
    known_tool_identifiers: Vec<String>,
}

impl AxisBuilder {
    pub fn new(config: AxisConfig, signing_key: SigningKey, self_id: impl Into<String>) -> Self {
        Self {
            config,
            signing_key,
            self_id: self_id.into(),
            router: None,
            planner: None,
            validator: None,
            tool_runtime: None,
            memory_writer: None,
            known_tool_identifiers: Vec::new(),
        }
    }

    /// Supplies a `Router` built ahead of time (e.g. because the
    /// Router-dispatched collaborators below already hold a clone of it).
    /// Without this, `build()` constructs its own, registering only
    /// `self_id`'s own key.
    pub fn router(mut self, router: Arc<Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn tool_runtime(mut self, tool_runtime: Arc<dyn ToolRuntime>) -> Self {
        self.tool_runtime = Some(tool_runtime);
        self
    }

    pub fn memory_writer(mut self, memory_writer: Arc<dyn MemoryWriter>) -> Self {
        self.memory_writer = Some(memory_writer);
        self
    }

    pub fn known_tool_identifiers(mut self, identifiers: Vec<String>) -> Self {
        self.known_tool_identifiers = identifiers;
        self
    }

    pub fn build(self) -> Result<Axis, String> {
        let planner = self.planner.ok_or("no Planner registered")?;
        let validator = self.validator.ok_or("no Validator registered")?;
        let tool_runtime = self.tool_runtime.ok_or("no ToolRuntime registered")?;
        let memory_writer = self.memory_writer.ok_or("no MemoryWriter registered")?;

        let queue: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

        let router = match self.router {
            Some(router) => router,
            None => {
                let keys = KeyRegistry::new();
                keys.register(&self.self_id, self.signing_key.verifying_key());
                Arc::new(Router::new(
                    keys,
                    ReplayWindow::new(self.config.replay_window_ms, self.config.max_replay_window_size),
                    Arc::new(NullAuditWriter) as Arc<dyn AuditWriter>,
                ))
            }
        };

        let metrics = Arc::new(MetricsCollector::new(queue.clone()));

        let replay_cache = Arc::new(ReplayCache::new(ReplayCacheConfig {
            max_entries: self.config.plan_cache.max_entries,
            ttl_ms: self.config.plan_cache.ttl_ms,
        }));
        let caching_planner: Arc<dyn Planner> = Arc::new(CachingPlanner::new(planner, replay_cache, self.known_tool_identifiers.clone()));
        let metered_validator: Arc<dyn Validator> = Arc::new(MetricsRecordingValidator::new(validator, metrics.clone()));
        let metered_tool_runtime: Arc<dyn ToolRuntime> = Arc::new(MetricsRecordingToolRuntime::new(tool_runtime, metrics.clone()));

        let pipeline = Arc::new(Pipeline::new(
            queue.clone(),
            caching_planner,
            metered_validator,
            metered_tool_runtime,
            memory_writer,
            PipelineConfig {
                known_tool_identifiers: self.known_tool_identifiers,
                ..PipelineConfig::default()
            },
        ));

        let worker_pool = Arc::new(WorkerPool::new(
            queue.clone(),
            pipeline.clone(),
            metrics.clone(),
            WorkerPoolConfig {
                workers: self.config.workers,
                claim_poll: std::time::Duration::from_millis(self.config.claim_poll_ms),
                graceful_shutdown: std::time::Duration::from_millis(self.config.graceful_shutdown_ms),
                awaiting_approval_warn: chrono::Duration::milliseconds(self.config.awaiting_approval_warn_ms as i64),
                ..WorkerPoolConfig::default()
            },
            "axis-worker",
        ));

        let lifecycle = Arc::new(LifecycleManager::new());

        Ok(Axis { config: self.config, queue, router, metrics, pipeline, worker_pool, lifecycle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axis_pipeline::{ExecuteOutcome, ExecuteRequest, PipelineError, PlanRequest, ReflectRequest};
    use axis_types::{PlannerReply, RiskLevel, StrippedPlan, ValidationResult, Verdict};
    use rand_core::OsRng;

    struct StubPlanner;
    #[async_trait]
    impl Planner for StubPlanner {
        async fn plan(&self, _request: PlanRequest) -> Result<PlannerReply, PipelineError> {
            Ok(PlannerReply::Fast { text: "ok".into() })
        }
    }

    struct StubValidator;
    #[async_trait]
    impl Validator for StubValidator {
        async fn validate(&self, _stripped: StrippedPlan) -> Result<ValidationResult, PipelineError> {
            Ok(ValidationResult { verdict: Verdict::Approved, overall_risk: RiskLevel::Low, steps: vec![] })
        }
    }

    struct StubToolRuntime;
    #[async_trait]
    impl ToolRuntime for StubToolRuntime {
        async fn execute(&self, _request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError> {
            Ok(ExecuteOutcome::Ok { result: serde_json::json!({}), duration_ms: 1 })
        }
    }

    struct StubMemoryWriter;
    #[async_trait]
    impl MemoryWriter for StubMemoryWriter {
        async fn reflect(&self, _request: ReflectRequest) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    #[test]
    fn build_fails_without_all_collaborators_registered() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let result = AxisBuilder::new(AxisConfig::default(), signing_key, "axis-core").planner(Arc::new(StubPlanner)).build();
        assert!(result.is_err());
    }

    #[test]
    fn build_succeeds_with_every_collaborator_registered() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let axis = AxisBuilder::new(AxisConfig::default(), signing_key, "axis-core")
            .planner(Arc::new(StubPlanner))
            .validator(Arc::new(StubValidator))
            .tool_runtime(Arc::new(StubToolRuntime))
            .memory_writer(Arc::new(StubMemoryWriter))
            .build()
            .unwrap();

        assert!(!axis.lifecycle.is_live());
    }
}
