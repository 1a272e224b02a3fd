//! On-demand metrics collection (spec §6 "Metrics exposition"): nothing
//! here is an in-process counter drifting from the source of truth except
//! the two tallies (tool executions, validator verdicts) that have no
//! other durable home - everything else is recomputed from the Job store
//! on each call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axis_queue::store::JobStore;
use serde::Serialize;

/// Spec §6's fixed histogram bucket boundaries, in seconds.
pub const DURATION_BUCKETS_SECONDS: [f64; 10] = [0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

#[derive(Clone, Debug, Default, Serialize)]
pub struct DurationHistogram {
    /// Count of completed Jobs whose duration fell at or under each of
    /// [`DURATION_BUCKETS_SECONDS`], in the same order, plus one final
    /// unbounded overflow count.
    pub bucket_counts: Vec<u64>,
    pub overflow_count: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsSnapshot {
    pub job_status_counts: HashMap<String, u64>,
    pub completed_duration_histogram: DurationHistogram,
    pub tool_execution_counts: HashMap<String, u64>,
    pub validator_verdict_counts: HashMap<String, u64>,
    pub process_rss_bytes: Option<u64>,
}

/// Collects the counters `axis-runtime` has no other durable home for
/// (tool executions, validator verdicts) and recomputes everything else
/// from the Job store when [`MetricsCollector::snapshot`] is called.
pub struct MetricsCollector {
    queue: Arc<dyn JobStore>,
    tool_execution_counts: Mutex<HashMap<(String, String), u64>>,
    validator_verdict_counts: Mutex<HashMap<String, u64>>,
}

impl MetricsCollector {
    pub fn new(queue: Arc<dyn JobStore>) -> Self {
        Self {
            queue,
            tool_execution_counts: Mutex::new(HashMap::new()),
            validator_verdict_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_tool_execution(&self, tool: &str, outcome: &str) {
        let mut counts = self.tool_execution_counts.lock().expect("metrics mutex poisoned");
        *counts.entry((tool.to_string(), outcome.to_string())).or_insert(0) += 1;
    }

    pub fn record_validator_verdict(&self, verdict: &str) {
        let mut counts = self.validator_verdict_counts.lock().expect("metrics mutex poisoned");
        *counts.entry(verdict.to_string()).or_insert(0) += 1;
    }

    fn job_status_counts(&self) -> HashMap<String, u64> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for job in self.queue.snapshot() {
            *counts.entry(job.status.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    fn completed_duration_histogram(&self) -> DurationHistogram {
        let mut bucket_counts = vec![0u64; DURATION_BUCKETS_SECONDS.len()];
        let mut overflow_count = 0u64;

        for job in self.queue.snapshot() {
            let (Some(completed_at), axis_types::JobStatus::Completed) = (job.completed_at, job.status) else {
                continue;
            };
            let duration_seconds = (completed_at - job.created_at).num_milliseconds().max(0) as f64 / 1000.0;

            match DURATION_BUCKETS_SECONDS.iter().position(|&bound| duration_seconds <= bound) {
                Some(index) => bucket_counts[index] += 1,
                None => overflow_count += 1,
            }
        }

        DurationHistogram { bucket_counts, overflow_count }
    }

    /// Reads resident set size from `/proc/self/statm` (pages, times the
    /// page size) on Linux; `None` on any other platform or read failure -
    /// avoids pulling in a system-info crate for a single gauge.
    #[cfg(target_os = "linux")]
    fn process_rss_bytes(&self) -> Option<u64> {
        let contents = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages: u64 = contents.split_whitespace().nth(1)?.parse().ok()?;
        let page_size = 4096u64;
        Some(resident_pages * page_size)
    }

    #[cfg(not(target_os = "linux"))]
    fn process_rss_bytes(&self) -> Option<u64> {
        None
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let tool_execution_counts = self
            .tool_execution_counts
            .lock()
            .expect("metrics mutex poisoned")
            .iter()
            .map(|((tool, outcome), count)| (format!("{tool}:{outcome}"), *count))
            .collect();

        let validator_verdict_counts = self.validator_verdict_counts.lock().expect("metrics mutex poisoned").clone();

        MetricsSnapshot {
            job_status_counts: self.job_status_counts(),
            completed_duration_histogram: self.completed_duration_histogram(),
            tool_execution_counts,
            validator_verdict_counts,
            process_rss_bytes: self.process_rss_bytes(),
        }
    }
}
