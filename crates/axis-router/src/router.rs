//! The message router: dispatches signed envelopes to registered
//! component handlers, auditing every attempt (spec §4.2 "Router").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axis_types::SignedEnvelope;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditEntry, AuditWriter};
use crate::error::RouterError;
use crate::keys::KeyRegistry;
use crate::replay_window::ReplayWindow;
use crate::signing::verify_envelope;

/// A component's inbound message handler. Receives the envelope's decoded
/// payload already verified; returns the raw reply payload to be wrapped
/// and signed by the caller, or an error string recorded on the audit
/// entry and surfaced as `RouterError::HandlerError`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, envelope: &SignedEnvelope, cancel: CancellationToken) -> Result<String, String>;
}

pub struct Router {
    keys: KeyRegistry,
    replay_window: ReplayWindow,
    audit: Arc<dyn AuditWriter>,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Router {
    pub fn new(keys: KeyRegistry, replay_window: ReplayWindow, audit: Arc<dyn AuditWriter>) -> Self {
        Self {
            keys,
            replay_window,
            audit,
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, component_id: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(component_id.into(), handler);
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Verifies `envelope`, dispatches it to `envelope.to`'s handler, and
    /// writes an audit entry regardless of outcome (spec §4.2 "Audit side
    /// effect": "every dispatch attempt, successful or rejected, produces
    /// exactly one audit entry").
    pub async fn dispatch(&self, envelope: SignedEnvelope, cancel: CancellationToken) -> Result<String, RouterError> {
        let to = envelope.decode_payload().ok().map(|message| message.to);
        let target = to.unwrap_or_else(|| "unknown".to_string());

        let result = self.dispatch_inner(&envelope, &target, cancel).await;

        let mut entry = AuditEntry::new(envelope.signer.clone(), "router.dispatch", target.clone());
        entry = match &result {
            Ok(_) => entry.with_details(serde_json::json!({ "outcome": "ok" })),
            Err(err) => entry.with_details(serde_json::json!({ "outcome": "rejected", "reason": err.to_string() })),
        };
        self.audit.write(entry).await;

        result
    }

    async fn dispatch_inner(
        &self,
        envelope: &SignedEnvelope,
        target: &str,
        cancel: CancellationToken,
    ) -> Result<String, RouterError> {
        verify_envelope(envelope, &self.keys, &self.replay_window, Utc::now())?;

        let handler = self
            .handlers
            .get(target)
            .ok_or_else(|| RouterError::NoHandler { component_id: target.to_string() })?;

        handler
            .handle(envelope, cancel)
            .await
            .map_err(|message| RouterError::HandlerError { component_id: target.to_string(), message })
    }
}
