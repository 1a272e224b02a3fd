//! The key registry: maps a component id to its current Ed25519
//! verifying key (spec §4.2 "Verification" step 1, "Ephemeral keys").
//!
//! Shared mutable state, protected by a mutex per spec §5 "Shared
//! resources" ("The key registry and the replay-window set are shared
//! mutable state and must be protected by a mutex or equivalent").

use std::collections::HashMap;
use std::sync::RwLock;

use ed25519_dalek::VerifyingKey;

#[derive(Default)]
pub struct KeyRegistry {
    keys: RwLock<HashMap<String, VerifyingKey>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component_id`'s public key for the duration of its
    /// registration. Re-registering replaces the prior key - used both
    /// for long-lived components and for ephemeral per-sandbox keypairs
    /// assigned at spawn (spec §4.2 "Ephemeral keys").
    pub fn register(&self, component_id: impl Into<String>, key: VerifyingKey) {
        self.keys.write().expect("key registry poisoned").insert(component_id.into(), key);
    }

    pub fn lookup(&self, component_id: &str) -> Option<VerifyingKey> {
        self.keys.read().expect("key registry poisoned").get(component_id).copied()
    }

    /// Remove a component's key, e.g. on sandbox teardown. Does not zero
    /// anything itself - `VerifyingKey` is public material; the private
    /// half's zeroing is the sandbox's responsibility (`axis-sandbox`'s
    /// `SecretsDir`-style discipline).
    pub fn revoke(&self, component_id: &str) {
        self.keys.write().expect("key registry poisoned").remove(component_id);
    }
}
