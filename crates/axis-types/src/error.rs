use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error category carried on a terminal [`crate::job::Job`] and
/// returned by any dispatch that fails. Mirrors the sum type in spec §7:
/// a closed set of kinds, not an open exception hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input. Never retried; surfaced to the caller.
    Validation,
    /// Signature, replay, or unknown-signer failure. Audited; message dropped.
    Authentication,
    /// A queue lookup found nothing.
    NotFound,
    /// A queue operation's compare-and-swap precondition did not hold.
    Conflict,
    /// Any dispatch or child process exceeded its deadline. Retriable.
    Timeout,
    /// Rate limited; retriable with a provided or computed retry-after.
    RateLimit,
    /// Child died, exceeded resource limits, or sent an invalid signed
    /// response. Non-retriable at the step; may be retriable at the Job
    /// level if attempts remain.
    SandboxFailure,
    /// Validator rejected the plan or exhausted the revision budget.
    /// Non-retriable.
    PlanValidation,
    /// Upstream language-model provider error, reclassified by status code.
    LlmProvider,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::SandboxFailure => "sandbox_failure",
            ErrorKind::PlanValidation => "plan_validation",
            ErrorKind::LlmProvider => "llm_provider",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified error carried through the pipeline and, on a terminal Job,
/// serialized into its `error` field.
///
/// Pairs a coarse [`ErrorKind`] with a human-readable message and optional
/// machine detail, the way `execution_error::ExecutionError` pairs
/// `ErrorKind` with `message`/`detail` - but adds `retriable` since Axis's
/// error kinds don't imply retriability on their own (`Timeout` and
/// `RateLimit` are retriable; `Validation` and `PlanValidation` never are;
/// `SandboxFailure` depends on remaining attempts).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AxisError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub retriable: bool,
}

impl AxisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retriable = matches!(kind, ErrorKind::Timeout | ErrorKind::RateLimit);
        Self {
            kind,
            message: message.into(),
            detail: None,
            retriable,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn sandbox_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SandboxFailure, message)
    }

    pub fn plan_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PlanValidation, message)
    }
}

/// Errors raised directly by queue operations (spec §4.1). Kept distinct
/// from [`AxisError`] because these are structural - they describe why an
/// operation on the state machine itself was refused, not a Job-level
/// outcome - mirroring how the teacher keeps `DomainError` (a single
/// structural violation) separate from `ExecutionError` (a richer runtime
/// outcome).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("job {job_id} is in status {current}, expected {expected}")]
    StateConflict {
        job_id: String,
        current: String,
        expected: String,
    },
    #[error("transition from {from} to {to} is not a legal state-machine edge")]
    InvalidTransition { from: String, to: String },
    #[error("job {job_id} not found")]
    NotFound { job_id: String },
    #[error("job {job_id} is already claimed by {claimed_by}")]
    AlreadyClaimed { job_id: String, claimed_by: String },
}

impl From<QueueError> for AxisError {
    fn from(err: QueueError) -> Self {
        match &err {
            QueueError::NotFound { .. } => AxisError::not_found(err.to_string()),
            QueueError::StateConflict { .. } | QueueError::AlreadyClaimed { .. } => {
                AxisError::conflict(err.to_string())
            }
            QueueError::InvalidTransition { .. } => AxisError::validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_defaults_follow_kind() {
        assert!(AxisError::new(ErrorKind::Timeout, "x").retriable);
        assert!(AxisError::new(ErrorKind::RateLimit, "x").retriable);
        assert!(!AxisError::new(ErrorKind::Validation, "x").retriable);
        assert!(!AxisError::new(ErrorKind::PlanValidation, "x").retriable);
    }

    #[test]
    fn queue_error_maps_to_expected_kind() {
        let conflict = QueueError::StateConflict {
            job_id: "j1".into(),
            current: "failed".into(),
            expected: "executing".into(),
        };
        assert_eq!(AxisError::from(conflict).kind, ErrorKind::Conflict);

        let not_found = QueueError::NotFound { job_id: "j1".into() };
        assert_eq!(AxisError::from(not_found).kind, ErrorKind::NotFound);
    }

    #[test]
    fn serializes_kind_as_snake_case() {
        let err = AxisError::new(ErrorKind::SandboxFailure, "child exited with code 137");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "sandbox_failure");
        assert_eq!(json["retriable"], false);
    }
}
