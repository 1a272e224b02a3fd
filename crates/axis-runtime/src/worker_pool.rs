//! Bounded worker pool (spec §4.4 "Worker Pool"): `maxWorkers` loops each
//! claiming one Job at a time and running it to a terminal status, plus a
//! watchdog task that periodically logs queue health.
//!
//! Grounded on the teacher's supervised-task shape: a `JoinSet` of worker
//! loops, a shared stop flag, and a graceful-then-forced shutdown sequence.

use std::sync::Arc;
use std::time::Duration;

use axis_queue::store::JobStore;
use axis_pipeline::Pipeline;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::metrics::MetricsCollector;

pub struct WorkerPoolConfig {
    pub workers: usize,
    pub claim_poll: Duration,
    pub graceful_shutdown: Duration,
    pub awaiting_approval_warn: chrono::Duration,
    pub watchdog_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            claim_poll: Duration::from_millis(200),
            graceful_shutdown: Duration::from_secs(30),
            awaiting_approval_warn: chrono::Duration::milliseconds(600_000),
            watchdog_interval: Duration::from_secs(30),
        }
    }
}

/// Owns the worker loops and the watchdog task. `start()` is idempotent -
/// calling it twice while already running is a no-op - and `stop()` gives
/// in-flight jobs `graceful_shutdown` to finish before cancelling them.
pub struct WorkerPool {
    queue: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    metrics: Arc<MetricsCollector>,
    config: WorkerPoolConfig,
    stopping: CancellationToken,
    tasks: tokio::sync::Mutex<Option<JoinSet<()>>>,
    worker_id_prefix: String,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn JobStore>, pipeline: Arc<Pipeline>, metrics: Arc<MetricsCollector>, config: WorkerPoolConfig, worker_id_prefix: impl Into<String>) -> Self {
        Self {
            queue,
            pipeline,
            metrics,
            config,
            stopping: CancellationToken::new(),
            tasks: tokio::sync::Mutex::new(None),
            worker_id_prefix: worker_id_prefix.into(),
        }
    }

    pub async fn start(&self) {
        let mut guard = self.tasks.lock().await;
        if guard.is_some() {
            return;
        }

        let mut set = JoinSet::new();
        for index in 0..self.config.workers {
            let worker_id = format!("{}-{index}", self.worker_id_prefix);
            let queue = self.queue.clone();
            let pipeline = self.pipeline.clone();
            let stopping = self.stopping.clone();
            let claim_poll = self.config.claim_poll;
            set.spawn(async move { worker_loop(worker_id, queue, pipeline, stopping, claim_poll).await });
        }

        let watchdog_queue = self.queue.clone();
        let watchdog_metrics = self.metrics.clone();
        let watchdog_stopping = self.stopping.clone();
        let watchdog_interval = self.config.watchdog_interval;
        let awaiting_approval_warn = self.config.awaiting_approval_warn;
        set.spawn(async move { watchdog_loop(watchdog_queue, watchdog_metrics, watchdog_stopping, watchdog_interval, awaiting_approval_warn).await });

        *guard = Some(set);
        info!(workers = self.config.workers, "worker pool started");
    }

    /// Signals all loops to stop, waits up to `graceful_shutdown` for
    /// in-flight jobs to finish naturally, then drops the remaining tasks -
    /// jobs not yet claimed stay pending for the next startup's recovery
    /// pass to pick up.
    pub async fn stop(&self) {
        let mut guard = self.tasks.lock().await;
        let Some(mut set) = guard.take() else {
            return;
        };

        self.stopping.cancel();

        let drained = tokio::time::timeout(self.config.graceful_shutdown, async {
            while set.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!("worker pool graceful shutdown timed out, aborting remaining tasks");
            set.shutdown().await;
        }

        info!("worker pool stopped");
    }
}

async fn worker_loop(worker_id: String, queue: Arc<dyn JobStore>, pipeline: Arc<Pipeline>, stopping: CancellationToken, claim_poll: Duration) {
    loop {
        if stopping.is_cancelled() {
            return;
        }

        let Some(job) = queue.claim(&worker_id) else {
            tokio::select! {
                _ = tokio::time::sleep(claim_poll) => continue,
                _ = stopping.cancelled() => return,
            }
        };

        let job_cancel = CancellationToken::new();
        let timeout = Duration::from_millis(job.timeout_ms);
        let job_id = job.id;

        // Run on its own task so a timeout can cancel the token and then
        // still await the pipeline's own cancellation handling, rather than
        // dropping the in-flight run and leaving the Job claimed forever.
        let task_pipeline = pipeline.clone();
        let task_cancel = job_cancel.clone();
        let mut handle = tokio::spawn(async move { task_pipeline.run(job_id, task_cancel).await });

        let result = tokio::select! {
            res = &mut handle => res,
            _ = tokio::time::sleep(timeout) => {
                job_cancel.cancel();
                warn!(job_id = %job_id, "job exceeded its timeout, cancelling");
                (&mut handle).await
            }
        };

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!(job_id = %job_id, error = %err, "job run failed"),
            Err(join_err) => warn!(job_id = %job_id, error = %join_err, "job task panicked"),
        }
    }
}

async fn watchdog_loop(queue: Arc<dyn JobStore>, metrics: Arc<MetricsCollector>, stopping: CancellationToken, interval: Duration, awaiting_approval_warn: chrono::Duration) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stopping.cancelled() => return,
        }

        let snapshot = metrics.snapshot();
        info!(status_counts = ?snapshot.job_status_counts, "watchdog sweep");

        let now = chrono::Utc::now();
        let aged: Vec<_> = queue
            .snapshot()
            .into_iter()
            .filter(|job| job.status == axis_types::JobStatus::AwaitingApproval)
            .filter(|job| now - job.created_at > awaiting_approval_warn)
            .map(|job| job.id)
            .collect();

        if !aged.is_empty() {
            warn!(job_ids = ?aged, "jobs awaiting approval past the warning threshold");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_pipeline::{ExecuteOutcome, ExecuteRequest, FailureState, MemoryWriter, PipelineConfig, PipelineError, Planner, PlanRequest, ReflectRequest, ToolRuntime, Validator};
    use axis_queue::store::InMemoryJobStore;
    use axis_types::{CreateJobOptions, JobSourceOrDefault, PlannerReply, StrippedPlan, ValidationResult, Verdict, RiskLevel};
    use async_trait::async_trait;

    struct FastPathPlanner;
    #[async_trait]
    impl Planner for FastPathPlanner {
        async fn plan(&self, _request: PlanRequest) -> Result<PlannerReply, PipelineError> {
            Ok(PlannerReply::Fast { text: "done".into() })
        }
    }

    struct UnusedValidator;
    #[async_trait]
    impl Validator for UnusedValidator {
        async fn validate(&self, _stripped: StrippedPlan) -> Result<ValidationResult, PipelineError> {
            Ok(ValidationResult { verdict: Verdict::Approved, overall_risk: RiskLevel::Low, steps: vec![] })
        }
    }

    struct UnusedToolRuntime;
    #[async_trait]
    impl ToolRuntime for UnusedToolRuntime {
        async fn execute(&self, _request: ExecuteRequest) -> Result<ExecuteOutcome, PipelineError> {
            Ok(ExecuteOutcome::Ok { result: serde_json::json!({}), duration_ms: 1 })
        }
    }

    struct NullMemoryWriter;
    #[async_trait]
    impl MemoryWriter for NullMemoryWriter {
        async fn reflect(&self, _request: ReflectRequest) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn worker_claims_and_completes_a_fast_path_job() {
        let queue = Arc::new(InMemoryJobStore::new());
        let job = queue.create_job(CreateJobOptions { source: JobSourceOrDefault(axis_types::JobSource::User), ..Default::default() });

        let pipeline = Arc::new(Pipeline::new(
            queue.clone(),
            Arc::new(FastPathPlanner),
            Arc::new(UnusedValidator),
            Arc::new(UnusedToolRuntime),
            Arc::new(NullMemoryWriter),
            PipelineConfig::default(),
        ));
        let metrics = Arc::new(MetricsCollector::new(queue.clone()));

        let pool = WorkerPool::new(queue.clone(), pipeline, metrics, WorkerPoolConfig { workers: 1, watchdog_interval: Duration::from_secs(3600), ..WorkerPoolConfig::default() }, "w");
        pool.start().await;

        let mut waited = Duration::from_millis(0);
        loop {
            let current = queue.get(job.id).unwrap();
            if current.status.is_terminal() {
                assert_eq!(current.status, axis_types::JobStatus::Completed);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
            assert!(waited < Duration::from_secs(5), "job never completed");
        }

        pool.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let queue = Arc::new(InMemoryJobStore::new());
        let pipeline = Arc::new(Pipeline::new(
            queue.clone(),
            Arc::new(FastPathPlanner),
            Arc::new(UnusedValidator),
            Arc::new(UnusedToolRuntime),
            Arc::new(NullMemoryWriter),
            PipelineConfig::default(),
        ));
        let metrics = Arc::new(MetricsCollector::new(queue.clone()));
        let pool = WorkerPool::new(queue, pipeline, metrics, WorkerPoolConfig { workers: 1, watchdog_interval: Duration::from_secs(3600), ..WorkerPoolConfig::default() }, "w");

        pool.start().await;
        pool.start().await;
        pool.stop().await;
    }
}
