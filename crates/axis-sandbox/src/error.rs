use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn gear process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("gear entry point is not yet resolvable: {0}")]
    UnresolvedEntryPoint(String),
    #[error("path {path} escapes the declared workspace/permission set")]
    PathNotAllowed { path: String },
    #[error("domain {domain} is not in the declared allowlist or is a private range")]
    DomainNotAllowed { domain: String },
    #[error("child process exceeded its kill timeout and did not exit")]
    KillTimeoutExceeded,
    #[error("child response failed signature verification")]
    InvalidResponseSignature,
    #[error("child response correlation id {expected} did not match request {actual}")]
    CorrelationMismatch { expected: String, actual: String },
}
