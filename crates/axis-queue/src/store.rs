//! The Job store: durable storage and concurrency control (spec §4.1).
//!
//! `JobStore` is a trait so a future SQL-backed implementation is a
//! drop-in replacement for `InMemoryJobStore` - the same discipline the
//! teacher crate applies by keeping the invariant-checking engine ignorant
//! of how the journal itself is persisted. The in-memory implementation
//! guards its map with a plain `std::sync::Mutex`, matching the teacher's
//! choice not to reach for a dependency like `parking_lot` for something
//! `std` already does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axis_types::{AxisError, CreateJobOptions, Job, JobId, JobStatus, QueueError, StepResult};
use chrono::{DateTime, Utc};

use crate::transitions::is_valid_transition;

/// Artifacts written alongside a status transition (spec §4.1: "Every
/// transition commits the new status *and* any artifacts atomically").
/// All fields optional; `transition` only overwrites what's `Some`.
#[derive(Clone, Debug, Default)]
pub struct TransitionArtifacts {
    pub plan: Option<axis_types::ExecutionPlan>,
    pub validation: Option<axis_types::ValidationResult>,
    pub append_results: Vec<StepResult>,
    pub error: Option<AxisError>,
}

/// Callback invoked after each successful transition, with `(job_id, from,
/// to)` (spec §4.1 `onStatusChange`). Delivered synchronously within the
/// same call that commits the transition - see DESIGN.md's resolution of
/// the status-change-listener Open Question.
pub type StatusListener = Arc<dyn Fn(JobId, JobStatus, JobStatus) + Send + Sync>;

/// Summary of startup recovery (spec §4.1 "Recovery").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    pub inspected: usize,
    pub reverted_to_pending: usize,
    pub reverted_to_awaiting_approval: usize,
    pub marked_failed_interrupted: usize,
    pub untouched: usize,
}

/// Durable storage and concurrency control for Jobs.
///
/// Implementations must guarantee: at most one live claim per Job; no
/// mutation of a terminal row; atomic status+artifact commits.
pub trait JobStore: Send + Sync {
    fn create_job(&self, options: CreateJobOptions) -> Job;
    fn claim(&self, worker_id: &str) -> Option<Job>;
    fn transition(
        &self,
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
        artifacts: TransitionArtifacts,
    ) -> Result<Job, QueueError>;
    fn cancel_job(&self, job_id: JobId) -> Result<bool, QueueError>;
    fn get(&self, job_id: JobId) -> Option<Job>;
    /// Point-in-time copy of every Job row, for metrics and watchdog
    /// reporting (spec §4.4 "Watchdog", §6 "Metrics exposition") - never
    /// used to drive orchestration decisions, only to observe them.
    fn snapshot(&self) -> Vec<Job>;
    fn on_status_change(&self, listener: StatusListener);
    /// Run startup recovery (spec §4.1 "Recovery"). `claim_stale_after` is
    /// the threshold (typically `2 * jobTimeoutMs`) past which a claimed,
    /// non-terminal Job is considered abandoned by a crashed worker.
    fn recover(&self, claim_stale_after: chrono::Duration, now: DateTime<Utc>) -> RecoveryResult;
}

struct Inner {
    jobs: HashMap<JobId, Job>,
    listeners: Vec<StatusListener>,
}

/// In-memory `JobStore`. Priority-then-FIFO claim ordering is implemented
/// by scanning all pending jobs and picking the (priority desc, created_at
/// asc) minimum each time `claim` is called - fine at the scale this
/// single-node runtime operates at; a SQL-backed store would instead use
/// an indexed `ORDER BY priority DESC, created_at ASC LIMIT 1 FOR UPDATE
/// SKIP LOCKED`.
pub struct InMemoryJobStore {
    inner: Mutex<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                listeners: Vec::new(),
            }),
        }
    }

    fn notify(listeners: &[StatusListener], job_id: JobId, from: JobStatus, to: JobStatus) {
        for listener in listeners {
            listener(job_id, from, to);
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn create_job(&self, options: CreateJobOptions) -> Job {
        let mut guard = self.inner.lock().expect("job store mutex poisoned");

        if let Some(fingerprint) = options.dedup_fingerprint.as_deref() {
            if let Some(existing) = guard
                .jobs
                .values()
                .find(|j| !j.status.is_terminal() && j.dedup_fingerprint.as_deref() == Some(fingerprint))
            {
                return existing.clone();
            }
        }

        let job = Job::new(options);
        guard.jobs.insert(job.id, job.clone());
        tracing::info!(job_id = %job.id, source = ?job.source, "job created");
        job
    }

    fn claim(&self, worker_id: &str) -> Option<Job> {
        let mut guard = self.inner.lock().expect("job store mutex poisoned");

        let candidate_id = guard
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.claimed_by.is_none())
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .map(|j| j.id)?;

        let job = guard.jobs.get_mut(&candidate_id)?;
        job.status = JobStatus::Planning;
        job.claimed_by = Some(worker_id.to_string());
        job.claimed_at = Some(Utc::now());
        let updated = job.clone();

        let listeners = guard.listeners.clone();
        drop(guard);
        Self::notify(&listeners, candidate_id, JobStatus::Pending, JobStatus::Planning);
        tracing::info!(job_id = %candidate_id, worker_id, "job claimed");
        Some(updated)
    }

    fn transition(
        &self,
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
        artifacts: TransitionArtifacts,
    ) -> Result<Job, QueueError> {
        if !is_valid_transition(from, to) {
            return Err(QueueError::InvalidTransition {
                from: from.name().to_string(),
                to: to.name().to_string(),
            });
        }

        let mut guard = self.inner.lock().expect("job store mutex poisoned");
        let job = guard.jobs.get_mut(&job_id).ok_or_else(|| QueueError::NotFound {
            job_id: job_id.to_string(),
        })?;

        if job.status.is_terminal() {
            return Err(QueueError::StateConflict {
                job_id: job_id.to_string(),
                current: job.status.name().to_string(),
                expected: from.name().to_string(),
            });
        }
        if job.status != from {
            return Err(QueueError::StateConflict {
                job_id: job_id.to_string(),
                current: job.status.name().to_string(),
                expected: from.name().to_string(),
            });
        }

        job.status = to;
        if let Some(plan) = artifacts.plan {
            job.plan = Some(plan);
        }
        if let Some(validation) = artifacts.validation {
            job.validation = Some(validation);
        }
        job.result.extend(artifacts.append_results);
        if let Some(error) = artifacts.error {
            job.error = Some(error);
        }
        if to.is_terminal() {
            job.completed_at = Some(Utc::now());
            job.claimed_by = None;
        }
        let updated = job.clone();

        let listeners = guard.listeners.clone();
        drop(guard);
        Self::notify(&listeners, job_id, from, to);
        tracing::info!(job_id = %job_id, from = %from, to = %to, "job transitioned");
        Ok(updated)
    }

    fn cancel_job(&self, job_id: JobId) -> Result<bool, QueueError> {
        let mut guard = self.inner.lock().expect("job store mutex poisoned");
        let job = guard.jobs.get_mut(&job_id).ok_or_else(|| QueueError::NotFound {
            job_id: job_id.to_string(),
        })?;

        if job.status.is_terminal() {
            return Ok(false);
        }

        let from = job.status;
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        job.claimed_by = None;
        let updated_id = job.id;

        let listeners = guard.listeners.clone();
        drop(guard);
        Self::notify(&listeners, updated_id, from, JobStatus::Cancelled);
        tracing::info!(job_id = %updated_id, %from, "job cancelled");
        Ok(true)
    }

    fn get(&self, job_id: JobId) -> Option<Job> {
        let guard = self.inner.lock().expect("job store mutex poisoned");
        guard.jobs.get(&job_id).cloned()
    }

    fn snapshot(&self) -> Vec<Job> {
        let guard = self.inner.lock().expect("job store mutex poisoned");
        guard.jobs.values().cloned().collect()
    }

    fn on_status_change(&self, listener: StatusListener) {
        let mut guard = self.inner.lock().expect("job store mutex poisoned");
        guard.listeners.push(listener);
    }

    fn recover(&self, claim_stale_after: chrono::Duration, now: DateTime<Utc>) -> RecoveryResult {
        let mut guard = self.inner.lock().expect("job store mutex poisoned");
        let mut result = RecoveryResult::default();

        let stale_ids: Vec<JobId> = guard
            .jobs
            .values()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.id)
            .collect();

        for id in stale_ids {
            result.inspected += 1;
            let job = guard.jobs.get_mut(&id).expect("scanned id must exist");

            let is_stale = job
                .claimed_at
                .is_some_and(|claimed_at| now - claimed_at > claim_stale_after);

            if !is_stale {
                result.untouched += 1;
                continue;
            }

            match job.status {
                JobStatus::Planning | JobStatus::Validating => {
                    job.status = JobStatus::Pending;
                    job.claimed_by = None;
                    job.claimed_at = None;
                    result.reverted_to_pending += 1;
                }
                JobStatus::AwaitingApproval => {
                    job.claimed_by = None;
                    job.claimed_at = None;
                    result.reverted_to_awaiting_approval += 1;
                }
                JobStatus::Executing => {
                    if job.result.len() as u32 >= job.max_attempts {
                        job.status = JobStatus::Failed;
                        job.error = Some(AxisError::new(
                            axis_types::ErrorKind::Timeout,
                            "interrupted",
                        ));
                        job.completed_at = Some(now);
                        job.claimed_by = None;
                        result.marked_failed_interrupted += 1;
                    } else {
                        job.status = JobStatus::Pending;
                        job.claimed_by = None;
                        job.claimed_at = None;
                        result.reverted_to_pending += 1;
                    }
                }
                JobStatus::Pending | JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                    result.untouched += 1;
                }
            }
        }

        tracing::info!(?result, "job recovery complete");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_types::{JobSourceOrDefault, Priority};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn opts(priority: Priority) -> CreateJobOptions {
        CreateJobOptions {
            source: JobSourceOrDefault(axis_types::JobSource::User),
            priority,
            ..Default::default()
        }
    }

    #[test]
    fn claim_returns_none_when_empty() {
        let store = InMemoryJobStore::new();
        assert!(store.claim("w1").is_none());
    }

    #[test]
    fn claim_is_exclusive() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(opts(Priority::Normal));
        let claimed = store.claim("w1").unwrap();
        assert_eq!(claimed.id, job.id);
        assert!(store.claim("w2").is_none());
    }

    #[test]
    fn claim_prefers_higher_priority_then_fifo() {
        let store = InMemoryJobStore::new();
        let low = store.create_job(opts(Priority::Low));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let critical = store.create_job(opts(Priority::Critical));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _normal = store.create_job(opts(Priority::Normal));

        let claimed = store.claim("w1").unwrap();
        assert_eq!(claimed.id, critical.id);
        let _ = low;
    }

    #[test]
    fn dedup_fingerprint_returns_existing_non_terminal_job() {
        let store = InMemoryJobStore::new();
        let first = store.create_job(CreateJobOptions {
            dedup_fingerprint: Some("fp-1".into()),
            ..opts(Priority::Normal)
        });
        let second = store.create_job(CreateJobOptions {
            dedup_fingerprint: Some("fp-1".into()),
            ..opts(Priority::Normal)
        });
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn transition_rejects_wrong_current_status() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(opts(Priority::Normal));
        let err = store
            .transition(job.id, JobStatus::Validating, JobStatus::Executing, TransitionArtifacts::default())
            .unwrap_err();
        assert!(matches!(err, QueueError::StateConflict { .. }));
    }

    #[test]
    fn transition_rejects_illegal_edge() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(opts(Priority::Normal));
        let err = store
            .transition(job.id, JobStatus::Pending, JobStatus::Executing, TransitionArtifacts::default())
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_rows_are_never_mutated() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(opts(Priority::Normal));
        store.claim("w1").unwrap();
        store
            .transition(job.id, JobStatus::Planning, JobStatus::Validating, TransitionArtifacts::default())
            .unwrap();
        store
            .transition(job.id, JobStatus::Validating, JobStatus::Failed, TransitionArtifacts::default())
            .unwrap();

        let err = store
            .transition(job.id, JobStatus::Failed, JobStatus::Cancelled, TransitionArtifacts::default())
            .unwrap_err();
        assert!(matches!(err, QueueError::StateConflict { .. }));
    }

    #[test]
    fn listener_fires_synchronously_with_ordering_preserved() {
        let store = InMemoryJobStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store.on_status_change(Arc::new(move |_id, from, to| {
            seen_clone.lock().unwrap().push((from, to));
        }));

        let job = store.create_job(opts(Priority::Normal));
        store.claim("w1").unwrap();
        store
            .transition(job.id, JobStatus::Planning, JobStatus::Validating, TransitionArtifacts::default())
            .unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                (JobStatus::Pending, JobStatus::Planning),
                (JobStatus::Planning, JobStatus::Validating),
            ]
        );
    }

    #[test]
    fn cancel_is_legal_from_any_non_terminal_status() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(opts(Priority::Normal));
        assert!(store.cancel_job(job.id).unwrap());
        assert_eq!(store.get(job.id).unwrap().status, JobStatus::Cancelled);
        assert!(!store.cancel_job(job.id).unwrap());
    }

    #[test]
    fn recovery_reverts_stale_claims_to_prior_boundary() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(opts(Priority::Normal));
        store.claim("w1").unwrap();

        let stale_cutoff = chrono::Duration::milliseconds(0);
        let later = Utc::now() + chrono::Duration::seconds(10);
        let result = store.recover(stale_cutoff, later);

        assert_eq!(result.reverted_to_pending, 1);
        let recovered = store.get(job.id).unwrap();
        assert_eq!(recovered.status, JobStatus::Pending);
        assert!(recovered.claimed_by.is_none());
    }

    #[test]
    fn recovery_marks_exhausted_executing_jobs_failed_interrupted() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(CreateJobOptions {
            max_attempts: Some(1),
            ..opts(Priority::Normal)
        });
        store.claim("w1").unwrap();
        store
            .transition(job.id, JobStatus::Planning, JobStatus::Validating, TransitionArtifacts::default())
            .unwrap();
        store
            .transition(
                job.id,
                JobStatus::Validating,
                JobStatus::Executing,
                TransitionArtifacts {
                    append_results: vec![StepResult {
                        step_id: "s1".into(),
                        output: serde_json::json!({}),
                        duration_ms: 10,
                        attempt: 1,
                    }],
                    ..Default::default()
                },
            )
            .unwrap();

        let later = Utc::now() + chrono::Duration::seconds(10);
        let result = store.recover(chrono::Duration::milliseconds(0), later);
        assert_eq!(result.marked_failed_interrupted, 1);
        assert_eq!(store.get(job.id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn snapshot_reflects_every_row_regardless_of_status() {
        let store = InMemoryJobStore::new();
        let a = store.create_job(opts(Priority::Normal));
        let b = store.create_job(opts(Priority::Normal));
        store.claim("w1").unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        let ids: Vec<JobId> = snapshot.iter().map(|j| j.id).collect();
        assert!(ids.contains(&a.id) && ids.contains(&b.id));
    }

    #[test]
    fn at_most_one_claim_under_concurrent_attempts() {
        let store = Arc::new(InMemoryJobStore::new());
        for _ in 0..8 {
            store.create_job(opts(Priority::Normal));
        }
        let success_count = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let success_count = Arc::clone(&success_count);
            handles.push(std::thread::spawn(move || {
                if store.claim(&format!("w{i}")).is_some() {
                    success_count.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(success_count.load(Ordering::SeqCst), 8);
    }
}
