//! The validator information barrier (spec §4.3 step 3). `ExecutionPlan::strip`
//! already produces a payload restricted to `{id, jobId, steps}`; this
//! module is the second line of defense - it inspects the raw envelope
//! payload about to be sent to the validator and drops any forbidden key
//! that made it in some other way, logging a barrier-violation warning so
//! the leak is visible even though it never reaches the wire.

use serde_json::{Map, Value};

const FORBIDDEN_KEYS: &[&str] = &["userMessage", "conversationHistory", "journalData", "gearCatalog"];

/// Removes any [`FORBIDDEN_KEYS`] entry from `payload` in place, returning
/// the keys that were actually present and dropped.
pub fn enforce(payload: &mut Map<String, Value>) -> Vec<String> {
    let mut dropped = Vec::new();
    for key in FORBIDDEN_KEYS {
        if payload.remove(*key).is_some() {
            dropped.push((*key).to_string());
        }
    }

    if !dropped.is_empty() {
        tracing::warn!(keys = ?dropped, "dropped forbidden key(s) before dispatching to validator");
    }

    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forbidden_keys_are_stripped_and_reported() {
        let mut payload = json!({
            "id": "plan-1",
            "jobId": "job-1",
            "steps": [],
            "userMessage": "do the thing",
            "gearCatalog": ["fs"],
        })
        .as_object()
        .unwrap()
        .clone();

        let dropped = enforce(&mut payload);

        assert!(!payload.contains_key("userMessage"));
        assert!(!payload.contains_key("gearCatalog"));
        assert!(payload.contains_key("steps"));
        assert_eq!(dropped.len(), 2);
    }

    #[test]
    fn clean_payload_drops_nothing() {
        let mut payload = json!({"id": "plan-1", "jobId": "job-1", "steps": []}).as_object().unwrap().clone();
        assert!(enforce(&mut payload).is_empty());
    }
}
