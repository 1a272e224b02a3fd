//! Semantic response cache (spec §4.8 "Semantic cache").

use std::sync::Mutex;

use axis_types::SemanticCacheEntry;
use chrono::{DateTime, Utc};

const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.98;

/// Keywords that always bypass the semantic cache - entirely read and
/// write, since a cached answer to "what's today's weather" goes stale
/// immediately (spec §4.8 "Bypass").
const TIME_SENSITIVE_KEYWORDS: &[&str] = &["weather", "news", "stock", "today"];

pub fn bypasses_cache(query: &str) -> bool {
    let lower = query.to_lowercase();
    TIME_SENSITIVE_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub struct SemanticCacheConfig {
    pub max_entries: usize,
    pub similarity_threshold: f32,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self { max_entries: 500, similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD }
    }
}

/// Bounded semantic cache keyed by embedding similarity rather than exact
/// match. Lookup is a linear scan restricted to the same `model`,
/// rejecting expired entries, returning the best match above the
/// similarity threshold (spec §4.8 "Lookup").
pub struct SemanticCache {
    config: SemanticCacheConfig,
    entries: Mutex<Vec<SemanticCacheEntry>>,
}

impl SemanticCache {
    pub fn new(config: SemanticCacheConfig) -> Self {
        Self { config, entries: Mutex::new(Vec::new()) }
    }

    pub fn put(&self, entry: SemanticCacheEntry) {
        let mut entries = self.entries.lock().expect("semantic cache poisoned");
        if entries.len() >= self.config.max_entries {
            entries.remove(0);
        }
        entries.push(entry);
    }

    /// Returns the best same-model, non-expired match whose cosine
    /// similarity to `query_embedding` is at or above the configured
    /// threshold, or `None`.
    pub fn lookup(&self, model: &str, query_embedding: &[f32], now: DateTime<Utc>) -> Option<SemanticCacheEntry> {
        let entries = self.entries.lock().expect("semantic cache poisoned");

        entries
            .iter()
            .filter(|entry| entry.model == model && !entry.is_expired(now))
            .map(|entry| (cosine_similarity(&entry.query_embedding, query_embedding), entry))
            .filter(|(similarity, _)| *similarity >= self.config.similarity_threshold)
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, entry)| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("semantic cache poisoned").len()
    }
}
