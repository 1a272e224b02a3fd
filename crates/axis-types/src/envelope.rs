use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job_id::JobId;

/// The logical inter-component message (spec §3 "Signed Envelope").
///
/// `AxisMessage` is what components think in terms of; `SignedEnvelope`
/// (below) is the authenticated wire wrapper around its serialized form.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AxisMessage {
    pub id: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// The canonical byte string signed by the author and checked by the
/// verifier: `messageId|timestamp|signer|payload-json` (spec §4.2
/// "Signing"). Kept as a free function rather than a method on
/// `SignedEnvelope` so `axis-router` can call it identically on both the
/// sending and verifying side without constructing an envelope first.
pub fn canonical_signing_bytes(message_id: &str, timestamp: &DateTime<Utc>, signer: &str, payload_json: &str) -> Vec<u8> {
    format!(
        "{}|{}|{}|{}",
        message_id,
        timestamp.to_rfc3339(),
        signer,
        payload_json
    )
    .into_bytes()
}

/// Every inter-component message, Ed25519-signed by its author (spec §3
/// "Signed Envelope", §4.2 "Signing").
///
/// `payload` is carried pre-serialized (the exact JSON string that was
/// signed) rather than as a `serde_json::Value`, because re-serializing a
/// `Value` is not guaranteed to reproduce the original byte string (key
/// order, whitespace) - and the signature covers bytes, not structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub signer: String,
    pub payload: String,
    /// Hex-encoded 64-byte Ed25519 signature.
    pub signature: String,
}

impl SignedEnvelope {
    pub fn signing_bytes(&self) -> Vec<u8> {
        canonical_signing_bytes(&self.message_id, &self.timestamp, &self.signer, &self.payload)
    }

    /// Deserialize `payload` into the logical [`AxisMessage`] it carries.
    /// Callers should verify the signature before trusting the result.
    pub fn decode_payload(&self) -> Result<AxisMessage, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}
