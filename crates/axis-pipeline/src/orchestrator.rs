//! The per-Job orchestrator (spec §4.3 "Pipeline Orchestrator").
//!
//! Grounded on `other_examples` oddjobs' `Runtime::start_step`-style flow:
//! dispatch one effect, extend accumulated results, log with structured
//! `tracing` fields at each stage, and let a circuit-breaker-shaped bound
//! (here, the fast-path retry budget and revision budget) stop a runaway
//! loop rather than recursing forever.

use std::sync::Arc;

use axis_queue::store::{JobStore, TransitionArtifacts};
use axis_types::{ExecutionPlan, Job, JobId, JobStatus, PlannerReply, StepResult, StrippedPlan, Verdict};
use tokio_util::sync::CancellationToken;

use crate::barrier;
use crate::collaborators::{ExecuteOutcome, ExecuteRequest, FailureState, MemoryWriter, Planner, PlanRequest, ReflectRequest, ToolRuntime, Validator};
use crate::error::PipelineError;
use crate::fastpath;

pub struct PipelineConfig {
    pub fast_path_retry_budget: u32,
    pub revision_budget: u32,
    pub known_tool_identifiers: Vec<String>,
    pub max_attempts: u32,
    pub backoff: axis_policy::BackoffConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fast_path_retry_budget: 2,
            revision_budget: 3,
            known_tool_identifiers: Vec::new(),
            max_attempts: 3,
            backoff: axis_policy::BackoffConfig::default(),
        }
    }
}

pub struct Pipeline {
    queue: Arc<dyn JobStore>,
    planner: Arc<dyn Planner>,
    validator: Arc<dyn Validator>,
    tool_runtime: Arc<dyn ToolRuntime>,
    memory_writer: Arc<dyn MemoryWriter>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        queue: Arc<dyn JobStore>,
        planner: Arc<dyn Planner>,
        validator: Arc<dyn Validator>,
        tool_runtime: Arc<dyn ToolRuntime>,
        memory_writer: Arc<dyn MemoryWriter>,
        config: PipelineConfig,
    ) -> Self {
        Self { queue, planner, validator, tool_runtime, memory_writer, config }
    }

    /// Runs one claimed Job through to a terminal status. Callers (the
    /// worker pool, spec §4.4) must have already claimed the Job - `claim()`
    /// itself performs the `pending -> planning` transition - so this call
    /// always starts from `planning`.
    pub async fn run(&self, job_id: JobId, cancel: CancellationToken) -> Result<Job, PipelineError> {
        let job = self.queue.get(job_id).ok_or(PipelineError::Queue(axis_types::QueueError::NotFound { job_id: job_id.to_string() }))?;

        if cancel.is_cancelled() {
            return self.cancel(job_id);
        }

        match self.plan_and_verify(&job, FailureState::default(), cancel.clone()).await {
            Ok(PlanOutcome::FastPath(text)) => self.complete_fast_path(job_id, text).await,
            Ok(PlanOutcome::FullPath(plan)) => self.validate_and_run(job_id, plan, cancel).await,
            Err(err) => self.fail(job_id, JobStatus::Planning, "fast_path_verification", &err).await,
        }
    }

    async fn plan_and_verify(&self, job: &Job, mut failure_state: FailureState, cancel: CancellationToken) -> Result<PlanOutcome, PipelineError> {
        let tools_available = !self.config.known_tool_identifiers.is_empty();

        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let request = PlanRequest {
                user_message: job
                    .metadata
                    .get("userMessage")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                job_id: job.id,
                source: job.source,
                conversation_history: job.metadata.get("conversationHistory").cloned().unwrap_or(serde_json::Value::Null),
                relevant_memories: job.metadata.get("relevantMemories").cloned().unwrap_or(serde_json::Value::Null),
                active_jobs: job.metadata.get("activeJobs").cloned().unwrap_or(serde_json::Value::Null),
                failure_state: failure_state.clone(),
                cumulative_tokens: 0,
            };

            match self.planner.plan(request).await? {
                PlannerReply::Full { plan } => return Ok(PlanOutcome::FullPath(plan)),
                PlannerReply::Fast { text } => match fastpath::verify(&text, &self.config.known_tool_identifiers, tools_available) {
                    Ok(()) => return Ok(PlanOutcome::FastPath(text)),
                    Err(violation) => {
                        tracing::warn!(job_id = %job.id, ?violation, attempt = failure_state.fast_path_retry_count, "fast-path verification failed");
                        failure_state.fast_path_retry_count += 1;
                        failure_state.force_full_path = true;
                        if failure_state.fast_path_retry_count > self.config.fast_path_retry_budget {
                            return Err(PipelineError::FastPathVerificationExhausted);
                        }
                    }
                },
            }
        }
    }

    async fn complete_fast_path(&self, job_id: JobId, text: String) -> Result<Job, PipelineError> {
        let artifacts = TransitionArtifacts {
            append_results: vec![StepResult { step_id: "fast_path".into(), output: serde_json::json!({ "text": text }), duration_ms: 0, attempt: 0 }],
            ..Default::default()
        };
        let job = self.queue.transition(job_id, JobStatus::Planning, JobStatus::Completed, artifacts)?;
        self.reflect(&job).await;
        Ok(job)
    }

    async fn validate_and_run(&self, job_id: JobId, mut plan: ExecutionPlan, cancel: CancellationToken) -> Result<Job, PipelineError> {
        self.queue.transition(job_id, JobStatus::Planning, JobStatus::Validating, TransitionArtifacts { plan: Some(plan.clone()), ..Default::default() })?;

        let mut revision_count = 0;
        loop {
            if cancel.is_cancelled() {
                return self.cancel(job_id);
            }

            let mut stripped_value = serde_json::to_value(plan.strip()).expect("StrippedPlan always serializes");
            if let Some(object) = stripped_value.as_object_mut() {
                barrier::enforce(object);
            }
            let stripped: StrippedPlan = serde_json::from_value(stripped_value).expect("barrier-enforced payload still deserializes into StrippedPlan");

            let validation = self.validator.validate(stripped).await?;

            match validation.verdict {
                Verdict::Approved => {
                    let job = self.queue.transition(
                        job_id,
                        JobStatus::Validating,
                        JobStatus::Executing,
                        TransitionArtifacts { validation: Some(validation), ..Default::default() },
                    )?;
                    return self.execute(job, cancel).await;
                }
                Verdict::NeedsUserApproval => {
                    let job = self.queue.transition(
                        job_id,
                        JobStatus::Validating,
                        JobStatus::AwaitingApproval,
                        TransitionArtifacts { validation: Some(validation), ..Default::default() },
                    )?;
                    return Ok(job);
                }
                Verdict::NeedsRevision => {
                    revision_count += 1;
                    if revision_count > self.config.revision_budget {
                        return self
                            .fail(job_id, JobStatus::Validating, "revision_budget_exhausted", &PipelineError::RevisionBudgetExhausted)
                            .await;
                    }
                    self.queue.transition(job_id, JobStatus::Validating, JobStatus::Planning, TransitionArtifacts::default())?;
                    let failure_state = FailureState { revision_count, fast_path_retry_count: 0, force_full_path: true };
                    let job_after_revision = self.queue.get(job_id).expect("job exists");
                    let reissued = self.plan_and_verify(&job_after_revision, failure_state, cancel.clone()).await?;
                    plan = match reissued {
                        PlanOutcome::FullPath(p) => p,
                        PlanOutcome::FastPath(text) => return self.complete_fast_path(job_id, text).await,
                    };
                    self.queue.transition(job_id, JobStatus::Planning, JobStatus::Validating, TransitionArtifacts { plan: Some(plan.clone()), ..Default::default() })?;
                }
                Verdict::Rejected => {
                    return self.fail(job_id, JobStatus::Validating, "plan_rejected", &PipelineError::PlanRejected).await;
                }
            }
        }
    }

    async fn execute(&self, mut job: Job, cancel: CancellationToken) -> Result<Job, PipelineError> {
        let plan = job.plan.clone().expect("executing job always has a plan");
        let mut results = Vec::new();

        for step in &plan.steps {
            if cancel.is_cancelled() {
                self.queue.transition(job.id, JobStatus::Executing, JobStatus::Cancelled, TransitionArtifacts { append_results: results, ..Default::default() })?;
                return Err(PipelineError::Cancelled);
            }

            let mut random = axis_policy::SystemRandom;
            let mut attempt = 0;
            loop {
                let outcome = self
                    .tool_runtime
                    .execute(ExecuteRequest {
                        gear: step.gear.clone(),
                        action: step.action.clone(),
                        parameters: step.parameters.clone(),
                        step_id: step.id.clone(),
                    })
                    .await?;

                match outcome {
                    ExecuteOutcome::Ok { result, duration_ms } => {
                        let step_result = StepResult { step_id: step.id.clone(), output: result, duration_ms, attempt };
                        results.push(step_result);
                        break;
                    }
                    ExecuteOutcome::Err { code, message, retriable } => {
                        let error_value = serde_json::json!({ "code": code, "message": message });
                        let decision = axis_policy::should_retry(&error_value, attempt, job.max_attempts, self.config.backoff, &mut random);
                        if retriable && decision.should_retry {
                            tracing::info!(job_id = %job.id, step_id = %step.id, attempt, delay_ms = decision.delay_ms, "retrying step");
                            tokio::time::sleep(std::time::Duration::from_millis(decision.delay_ms)).await;
                            attempt += 1;
                            continue;
                        }

                        let error = axis_types::AxisError::new(axis_types::ErrorKind::SandboxFailure, message).with_detail(code).retriable(false);
                        let artifacts = TransitionArtifacts { append_results: results, error: Some(error), ..Default::default() };
                        job = self.queue.transition(job.id, JobStatus::Executing, JobStatus::Failed, artifacts)?;
                        self.reflect(&job).await;
                        return Ok(job);
                    }
                }
            }
        }

        let artifacts = TransitionArtifacts { append_results: results, ..Default::default() };
        job = self.queue.transition(job.id, JobStatus::Executing, JobStatus::Completed, artifacts)?;
        self.reflect(&job).await;
        Ok(job)
    }

    async fn reflect(&self, job: &Job) {
        // A plan with at least one step opts into reflection unless every
        // step explicitly sets `journalSkip` (spec §4.3 step 6). A fast-path
        // completion has no steps and is always reflected.
        let journal_skip = job
            .plan
            .as_ref()
            .is_some_and(|plan| !plan.steps.is_empty() && plan.steps.iter().all(|s| s.journal_skip == Some(true)));
        if journal_skip {
            return;
        }

        let request = ReflectRequest {
            job_id: job.id,
            summary: serde_json::json!({ "status": job.status.name() }),
            outcome: serde_json::to_value(&job.result).unwrap_or(serde_json::Value::Null),
        };

        if let Err(err) = self.memory_writer.reflect(request).await {
            tracing::warn!(job_id = %job.id, %err, "reflect dispatch failed, job status unaffected");
        }
    }

    fn cancel(&self, job_id: JobId) -> Result<Job, PipelineError> {
        let job = self.queue.get(job_id).ok_or(PipelineError::Queue(axis_types::QueueError::NotFound { job_id: job_id.to_string() }))?;
        let job = self.queue.transition(job_id, job.status, JobStatus::Cancelled, TransitionArtifacts::default())?;
        Ok(job)
    }

    async fn fail(&self, job_id: JobId, from: JobStatus, reason: &str, err: &PipelineError) -> Result<Job, PipelineError> {
        let error = axis_types::AxisError::new(axis_types::ErrorKind::PlanValidation, err.to_string()).with_detail(reason).retriable(false);
        let artifacts = TransitionArtifacts { error: Some(error), ..Default::default() };
        let job = self.queue.transition(job_id, from, JobStatus::Failed, artifacts)?;
        self.reflect(&job).await;
        Ok(job)
    }
}

enum PlanOutcome {
    FastPath(String),
    FullPath(ExecutionPlan),
}
