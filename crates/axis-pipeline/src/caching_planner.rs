//! Decorates any [`Planner`] with the plan replay cache (spec §4.8 "Plan
//! replay cache"): a cache hit skips the inner planner entirely and
//! returns the cached plan as a full-path reply.
//!
//! The semantic cache (spec §4.8 "Semantic cache") is deliberately not
//! wired in here: its key is a query embedding, and nothing in this stack
//! computes one - `axis-cache::semantic` is exercised directly by its own
//! tests, but a live lookup needs an embedding provider this crate has no
//! opinion about.

use std::sync::Arc;

use async_trait::async_trait;
use axis_cache::{cache_key, is_eligible, ReplayCache};
use axis_types::{JobSource, PlannerReply};
use chrono::Utc;

use crate::collaborators::{Planner, PlanRequest};
use crate::error::PipelineError;

pub struct CachingPlanner {
    inner: Arc<dyn Planner>,
    replay_cache: Arc<ReplayCache>,
    tool_catalog: Vec<String>,
}

impl CachingPlanner {
    pub fn new(inner: Arc<dyn Planner>, replay_cache: Arc<ReplayCache>, tool_catalog: Vec<String>) -> Self {
        Self { inner, replay_cache, tool_catalog }
    }
}

#[async_trait]
impl Planner for CachingPlanner {
    async fn plan(&self, request: PlanRequest) -> Result<PlannerReply, PipelineError> {
        // Revision loops always carry a plan already rejected once;
        // replaying a cached plan back into the same loop would just
        // reproduce the rejection, so only a Job's first planning attempt
        // consults the cache.
        let first_attempt = request.failure_state.revision_count == 0 && !request.failure_state.force_full_path;
        let key = cache_key(&request.user_message, &self.tool_catalog);

        if first_attempt && request.source == JobSource::Schedule {
            if let Some(hit) = self.replay_cache.get(&key, Utc::now()) {
                return Ok(PlannerReply::Full { plan: hit.plan });
            }
        }

        let reply = self.inner.plan(request.clone()).await?;

        if let PlannerReply::Full { ref plan } = reply {
            if is_eligible(request.source, plan) {
                self.replay_cache.put(key, plan.clone(), None, Utc::now());
            }
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FailureState;
    use axis_cache::ReplayCacheConfig;
    use axis_types::{ExecutionPlan, JobId, RiskLevel, Step};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plan_with_step() -> ExecutionPlan {
        ExecutionPlan {
            id: "p1".into(),
            job_id: JobId::new(),
            steps: vec![Step {
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
        }
    }

    struct CountingPlanner {
        calls: AtomicUsize,
        plan: ExecutionPlan,
    }

    #[async_trait]
    impl Planner for CountingPlanner {
        async fn plan(&self, _request: PlanRequest) -> Result<PlannerReply, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PlannerReply::Full { plan: self.plan.clone() })
        }
    }

    fn request(source: JobSource) -> PlanRequest {
        PlanRequest {
            user_message: "find all todo comments".into(),
            job_id: JobId::new(),
            source,
            conversation_history: serde_json::Value::Null,
            relevant_memories: serde_json::Value::Null,
            active_jobs: serde_json::Value::Null,
            failure_state: FailureState::default(),
            cumulative_tokens: 0,
        }
    }

    #[tokio::test]
    async fn eligible_scheduled_plan_is_cached_and_reused_on_repeat() {
        let inner = Arc::new(CountingPlanner { calls: AtomicUsize::new(0), plan: plan_with_step() });
        let replay_cache = Arc::new(ReplayCache::new(ReplayCacheConfig::default()));
        let planner = CachingPlanner::new(inner.clone(), replay_cache, vec!["file-manager".into()]);

        planner.plan(request(JobSource::Schedule)).await.unwrap();
        planner.plan(request(JobSource::Schedule)).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1, "second call should be served from cache");
    }

    #[tokio::test]
    async fn user_sourced_jobs_never_consult_or_populate_the_cache() {
        let inner = Arc::new(CountingPlanner { calls: AtomicUsize::new(0), plan: plan_with_step() });
        let replay_cache = Arc::new(ReplayCache::new(ReplayCacheConfig::default()));
        let planner = CachingPlanner::new(inner.clone(), replay_cache.clone(), vec!["file-manager".into()]);

        planner.plan(request(JobSource::User)).await.unwrap();
        planner.plan(request(JobSource::User)).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(replay_cache.is_empty());
    }
}
