//! Plan replay cache (spec §4.8 "Plan replay cache").
//!
//! Generalizes `invariant-journal`'s `ReplayCache`: batch-built-by-key map
//! with a typed lookup, but keyed by a normalized-input hash instead of a
//! `PromiseId`, and bounded with TTL + LRU-by-`createdAt` eviction instead
//! of holding the whole journal forever.

use std::collections::HashMap;

use axis_types::{ExecutionPlan, JobSource, PlanReplayEntry};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::{LazyLock, Mutex};

/// Tools known to be non-deterministic; a plan using any of these is
/// never cache-eligible (spec §4.8 "no step uses a non-deterministic tool").
const NONDETERMINISTIC_TOOLS: &[&str] = &["web-search", "web-fetch"];

/// Step parameter keys treated as time-sensitive; a plan with any step
/// carrying one of these keys is never cache-eligible.
const TIME_SENSITIVE_KEYS: &[&str] = &["timestamp", "date", "time", "now", "today"];

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?").unwrap()
});
static UNIX_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{10,13}\b").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lowercases `input` after stripping ISO-8601 and 10-13-digit unix
/// timestamps, then collapses whitespace (spec §4.8 "Normalization").
pub fn normalize(input: &str) -> String {
    let stripped = ISO_TIMESTAMP.replace_all(input, "");
    let stripped = UNIX_TIMESTAMP.replace_all(&stripped, "");
    WHITESPACE.replace_all(stripped.trim(), " ").to_lowercase()
}

/// Key = hash of `normalize(userMessage) | sorted(toolCatalog)` (spec §4.8).
pub fn cache_key(user_message: &str, tool_catalog: &[String]) -> String {
    let mut sorted_catalog = tool_catalog.to_vec();
    sorted_catalog.sort();
    let mut hasher = Sha256::new();
    hasher.update(normalize(user_message).as_bytes());
    hasher.update(b"|");
    hasher.update(sorted_catalog.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

/// True iff a plan produced for a Job of the given source is eligible to
/// be written to the replay cache (spec §4.8 "Eligibility").
pub fn is_eligible(source: JobSource, plan: &ExecutionPlan) -> bool {
    if source != JobSource::Schedule {
        return false;
    }
    if plan.steps.is_empty() {
        return false;
    }
    plan.steps.iter().all(|step| {
        !NONDETERMINISTIC_TOOLS.contains(&step.gear.as_str())
            && !step.parameters.keys().any(|key| TIME_SENSITIVE_KEYS.contains(&key.to_lowercase().as_str()))
    })
}

pub struct ReplayCacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for ReplayCacheConfig {
    fn default() -> Self {
        Self { max_entries: 1000, ttl: Duration::hours(24) }
    }
}

/// Bounded, TTL'd plan replay cache, keyed by [`cache_key`]. Eviction is
/// oldest-`createdAt`-first once `max_entries` is exceeded, mirroring the
/// teacher's batch-map shape but adding the bound the journal never needed
/// (a journal's entries are finite per-job; this cache is shared and
/// long-lived).
pub struct ReplayCache {
    config: ReplayCacheConfig,
    entries: Mutex<HashMap<String, PlanReplayEntry>>,
}

impl ReplayCache {
    pub fn new(config: ReplayCacheConfig) -> Self {
        Self { config, entries: Mutex::new(HashMap::new()) }
    }

    /// Inserts `plan` under `input_hash`, evicting the oldest entry if the
    /// cache is at capacity.
    pub fn put(&self, input_hash: String, plan: ExecutionPlan, approval_hash: Option<String>, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("replay cache poisoned");

        if entries.len() >= self.config.max_entries && !entries.contains_key(&input_hash) {
            if let Some(oldest_key) = entries.values().min_by_key(|entry| entry.created_at).map(|entry| entry.input_hash.clone()) {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            input_hash.clone(),
            PlanReplayEntry { input_hash, plan, approval_hash, created_at: now, hit_count: 0 },
        );
    }

    /// Looks up `input_hash`, pruning and returning `None` if the entry has
    /// expired; bumps `hit_count` on a hit.
    pub fn get(&self, input_hash: &str, now: DateTime<Utc>) -> Option<PlanReplayEntry> {
        let mut entries = self.entries.lock().expect("replay cache poisoned");

        match entries.get(input_hash) {
            Some(entry) if now - entry.created_at > self.config.ttl => {
                entries.remove(input_hash);
                None
            }
            Some(entry) => {
                let mut hit = entry.clone();
                hit.hit_count += 1;
                entries.insert(input_hash.to_string(), hit.clone());
                Some(hit)
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("replay cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
