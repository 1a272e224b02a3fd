use thiserror::Error;

/// Rejection reasons for inbound envelope verification (spec §4.2
/// "Signing" steps 1-4). Each variant maps to `AuthenticationFailure` at
/// the `AxisError` boundary - kept as its own enum here so the audit
/// entry can record *which* check failed, not just that one did.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("unknown signer: {signer}")]
    UnknownSigner { signer: String },
    #[error("timestamp {timestamp} is outside the replay window")]
    TimestampOutOfWindow { timestamp: String },
    #[error("timestamp {timestamp} is too far in the future")]
    ClockSkewExceeded { timestamp: String },
    #[error("message id {message_id} was already seen within the replay window")]
    DuplicateMessageId { message_id: String },
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("no handler registered for component {component_id}")]
    NoHandler { component_id: String },
    #[error("handler for {component_id} returned an error: {message}")]
    HandlerError { component_id: String, message: String },
}

impl RouterError {
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, RouterError::NoHandler { .. } | RouterError::HandlerError { .. })
    }
}
