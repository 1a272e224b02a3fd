//! Envelope signing and verification (spec §4.2 "Signing").

use axis_types::{canonical_signing_bytes, SignedEnvelope};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::RouterError;
use crate::keys::KeyRegistry;
use crate::replay_window::ReplayWindow;

pub fn sign_envelope(signing_key: &SigningKey, signer: &str, message_id: String, payload: String) -> SignedEnvelope {
    let timestamp = Utc::now();
    let bytes = canonical_signing_bytes(&message_id, &timestamp, signer, &payload);
    let signature: Signature = signing_key.sign(&bytes);

    SignedEnvelope {
        message_id,
        timestamp,
        signer: signer.to_string(),
        payload,
        signature: hex::encode(signature.to_bytes()),
    }
}

/// Clock-skew tolerance for an envelope's `timestamp` being in the future
/// (spec §4.2 "Verification" step 2).
const FUTURE_SKEW_TOLERANCE: Duration = Duration::seconds(5);

/// Full verification pipeline: signer lookup, replay window, clock skew,
/// signature (spec §4.2 "Verification" steps 1-4, in that order).
pub fn verify_envelope(
    envelope: &SignedEnvelope,
    keys: &KeyRegistry,
    replay_window: &ReplayWindow,
    now: DateTime<Utc>,
) -> Result<(), RouterError> {
    let verifying_key: VerifyingKey = keys.lookup(&envelope.signer).ok_or_else(|| RouterError::UnknownSigner {
        signer: envelope.signer.clone(),
    })?;

    if envelope.timestamp > now + FUTURE_SKEW_TOLERANCE {
        return Err(RouterError::ClockSkewExceeded {
            timestamp: envelope.timestamp.to_rfc3339(),
        });
    }

    if now - envelope.timestamp > replay_window.window() {
        return Err(RouterError::TimestampOutOfWindow {
            timestamp: envelope.timestamp.to_rfc3339(),
        });
    }

    if !replay_window.check_and_record(&envelope.message_id, now) {
        return Err(RouterError::DuplicateMessageId {
            message_id: envelope.message_id.clone(),
        });
    }

    let sig_bytes = hex::decode(&envelope.signature).map_err(|_| RouterError::InvalidSignature)?;
    let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| RouterError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_array);

    let bytes = envelope.signing_bytes();
    verifying_key
        .verify(&bytes, &signature)
        .map_err(|_| RouterError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn setup() -> (SigningKey, KeyRegistry, ReplayWindow) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let keys = KeyRegistry::new();
        keys.register("planner", signing_key.verifying_key());
        let replay_window = ReplayWindow::new(60_000, 10_000);
        (signing_key, keys, replay_window)
    }

    #[test]
    fn round_trip_sign_then_verify_succeeds() {
        let (signing_key, keys, replay_window) = setup();
        let envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{\"a\":1}".into());
        assert!(verify_envelope(&envelope, &keys, &replay_window, Utc::now()).is_ok());
    }

    #[test]
    fn tampering_any_byte_of_payload_fails_verification() {
        let (signing_key, keys, replay_window) = setup();
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{\"a\":1}".into());
        envelope.payload = "{\"a\":2}".into();
        assert!(verify_envelope(&envelope, &keys, &replay_window, Utc::now()).is_err());
    }

    #[test]
    fn tampering_timestamp_fails_verification() {
        let (signing_key, keys, replay_window) = setup();
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        envelope.timestamp = envelope.timestamp + Duration::seconds(1);
        assert!(verify_envelope(&envelope, &keys, &replay_window, Utc::now()).is_err());
    }

    #[test]
    fn tampering_signer_fails_verification() {
        let (signing_key, keys, replay_window) = setup();
        keys.register("validator", signing_key.verifying_key());
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        envelope.signer = "validator".into();
        assert!(verify_envelope(&envelope, &keys, &replay_window, Utc::now()).is_err());
    }

    #[test]
    fn tampering_message_id_fails_verification() {
        let (signing_key, keys, replay_window) = setup();
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        envelope.message_id = "msg-2".into();
        assert!(verify_envelope(&envelope, &keys, &replay_window, Utc::now()).is_err());
    }

    #[test]
    fn tampering_signature_fails_verification() {
        let (signing_key, keys, replay_window) = setup();
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        let mut sig = hex::decode(&envelope.signature).unwrap();
        sig[0] ^= 0xFF;
        envelope.signature = hex::encode(sig);
        assert!(verify_envelope(&envelope, &keys, &replay_window, Utc::now()).is_err());
    }

    #[test]
    fn unknown_signer_is_rejected() {
        let (signing_key, keys, replay_window) = setup();
        keys.revoke("planner");
        let envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        let err = verify_envelope(&envelope, &keys, &replay_window, Utc::now()).unwrap_err();
        assert!(matches!(err, RouterError::UnknownSigner { .. }));
    }

    #[test]
    fn future_timestamp_beyond_skew_tolerance_is_rejected() {
        let (signing_key, keys, replay_window) = setup();
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        envelope.timestamp = Utc::now() + Duration::seconds(30);
        let err = verify_envelope(&envelope, &keys, &replay_window, Utc::now()).unwrap_err();
        assert!(matches!(err, RouterError::ClockSkewExceeded { .. }));
    }

    #[test]
    fn timestamp_older_than_replay_window_is_rejected() {
        let (signing_key, keys, replay_window) = setup();
        let mut envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        envelope.timestamp = Utc::now() - Duration::seconds(61);
        let err = verify_envelope(&envelope, &keys, &replay_window, Utc::now()).unwrap_err();
        assert!(matches!(err, RouterError::TimestampOutOfWindow { .. }));
    }

    #[test]
    fn duplicate_message_id_is_rejected_on_second_dispatch() {
        let (signing_key, keys, replay_window) = setup();
        let envelope = sign_envelope(&signing_key, "planner", "msg-1".into(), "{}".into());
        let now = Utc::now();
        assert!(verify_envelope(&envelope, &keys, &replay_window, now).is_ok());
        let err = verify_envelope(&envelope, &keys, &replay_window, now).unwrap_err();
        assert!(matches!(err, RouterError::DuplicateMessageId { .. }));
    }
}
