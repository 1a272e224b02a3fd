use axis_types::{JobId, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit record (spec §4.2 "Audit side effect", §6 "Audit writer").
/// Written for every dispatch, successful or rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            risk_level: None,
            target: target.into(),
            job_id: None,
            details: serde_json::Value::Null,
            at: Utc::now(),
        }
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Append-only audit sink (spec §6 "Audit writer"). `write` must never
/// block the caller longer than the writer's own discipline permits, and
/// audit entries are never deleted by data-deletion requests - both are
/// obligations on implementors, not enforceable by the trait itself.
#[async_trait::async_trait]
pub trait AuditWriter: Send + Sync {
    async fn write(&self, entry: AuditEntry);
}

/// An `AuditWriter` that drops every entry after logging it at `debug`.
/// Useful as a default collaborator in tests and examples where no real
/// audit sink is wired up.
pub struct NullAuditWriter;

#[async_trait::async_trait]
impl AuditWriter for NullAuditWriter {
    async fn write(&self, entry: AuditEntry) {
        tracing::debug!(actor = %entry.actor, action = %entry.action, "audit entry dropped by NullAuditWriter");
    }
}
