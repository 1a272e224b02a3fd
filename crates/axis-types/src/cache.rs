use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::ExecutionPlan;

/// An entry in the plan replay cache (spec §3 "Cache entries", §4.8).
/// Keyed externally by `inputHash` in the cache's map; the hash is
/// carried on the entry too so eviction/inspection code doesn't need the
/// map key threaded through separately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanReplayEntry {
    pub input_hash: String,
    pub plan: ExecutionPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub hit_count: u64,
}

/// An entry in the semantic response cache (spec §3 "Cache entries",
/// §4.8). `query_embedding` is a dense vector; similarity is cosine
/// distance, computed by `axis-cache`, not stored here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticCacheEntry {
    pub id: String,
    pub query_embedding: Vec<f32>,
    pub response: serde_json::Value,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SemanticCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
