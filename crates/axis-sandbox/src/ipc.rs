//! Signed request/response framing between the parent and a sandboxed
//! gear process (spec §4.6 "IPC"). Each frame is a newline-delimited JSON
//! envelope; the parent signs every request, the child must echo the
//! request's `correlation_id`, and the parent verifies the child's
//! signature before accepting the response.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GearRequest {
    pub correlation_id: String,
    pub action: String,
    pub parameters: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GearResponse {
    pub correlation_id: String,
    #[serde(flatten)]
    pub outcome: GearOutcome,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearOutcome {
    Ok { result: serde_json::Value, duration_ms: u64 },
    Err { code: String, message: String, retriable: bool },
}

/// Sign a serialized request body, returning the frame to write to the
/// child's stdin as `{body}\n{signature_hex}\n`.
pub fn sign_request(signing_key: &SigningKey, request: &GearRequest) -> Result<String, SandboxError> {
    let body = serde_json::to_string(request).map_err(|e| SandboxError::UnresolvedEntryPoint(e.to_string()))?;
    let signature: Signature = signing_key.sign(body.as_bytes());
    Ok(format!("{body}\n{}\n", hex::encode(signature.to_bytes())))
}

/// Verify and decode a response frame of the same `{body}\n{signature_hex}\n`
/// shape, checking the echoed `correlation_id` against what was sent.
pub fn verify_response(
    verifying_key: &VerifyingKey,
    frame: &str,
    expected_correlation_id: &str,
) -> Result<GearResponse, SandboxError> {
    let mut lines = frame.lines();
    let body = lines.next().ok_or(SandboxError::InvalidResponseSignature)?;
    let sig_hex = lines.next().ok_or(SandboxError::InvalidResponseSignature)?;

    let sig_bytes = hex::decode(sig_hex).map_err(|_| SandboxError::InvalidResponseSignature)?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| SandboxError::InvalidResponseSignature)?;
    let signature = Signature::from_bytes(&sig_array);

    verifying_key
        .verify(body.as_bytes(), &signature)
        .map_err(|_| SandboxError::InvalidResponseSignature)?;

    let response: GearResponse =
        serde_json::from_str(body).map_err(|_| SandboxError::InvalidResponseSignature)?;

    if response.correlation_id != expected_correlation_id {
        return Err(SandboxError::CorrelationMismatch {
            expected: expected_correlation_id.to_string(),
            actual: response.correlation_id,
        });
    }

    Ok(response)
}
