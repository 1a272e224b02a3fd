use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

/// Encoding alphabet for the random tail: Crockford base32, lowercased.
/// No `i`, `l`, `o`, `u` - avoids visual ambiguity and accidental words.
const ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// Monotonic counter guarding against same-millisecond ID collisions from
/// this process. Wraps at 2^16; the random suffix absorbs the remainder.
static SEQ: AtomicU16 = AtomicU16::new(0);

/// Time-sortable unique identifier for a [`crate::job::Job`].
///
/// 48 bits of millisecond Unix timestamp, followed by 80 bits of entropy
/// (a per-process sequence counter plus random fill), both big-endian so
/// that lexicographic byte order equals creation order. Encoded as 26
/// lowercase base32 characters for display and storage.
///
/// Display: `"01h9z8p3k0qjzqjzqjzqjzqjzq"`-shaped (ULID-like), never
/// exposing internal structure beyond ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId([u8; 16]);

impl JobId {
    /// Generate a new ID from the current wall-clock time.
    ///
    /// Not cryptographically unpredictable by design - only the ordering
    /// property and practical non-collision are required by the spec.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Generate a new ID pinned to a specific timestamp. Exposed for
    /// deterministic tests; production code should use [`Self::new`].
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        let millis = timestamp.timestamp_millis().max(0) as u64;
        let mut bytes = [0u8; 16];
        bytes[0..6].copy_from_slice(&millis.to_be_bytes()[2..8]);

        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        bytes[6..8].copy_from_slice(&seq.to_be_bytes());

        let mut rand_buf = [0u8; 8];
        fill_random(&mut rand_buf);
        bytes[8..16].copy_from_slice(&rand_buf);

        Self(bytes)
    }

    /// Construct directly from raw bytes, e.g. when deserializing from a
    /// persisted row. Does not validate ordering properties.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Millisecond Unix timestamp encoded in the leading 48 bits.
    pub fn timestamp_millis(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf[2..8].copy_from_slice(&self.0[0..6]);
        u64::from_be_bytes(buf)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_random(buf: &mut [u8]) {
    // A minimal, dependency-free fill: each byte mixes the current instant's
    // subsecond nanoseconds with the process-wide sequence counter so that
    // two IDs minted in the same millisecond still diverge in their tail.
    let nanos = Utc::now().timestamp_subsec_nanos();
    let seq = SEQ.load(Ordering::Relaxed) as u32;
    let mut state = nanos ^ seq.wrapping_mul(0x9E3779B9);
    for byte in buf.iter_mut() {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        *byte = (state >> 16) as u8;
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 16 bytes -> 128 bits -> 26 base32 chars (130 bits, top 2 unused).
        let mut bits: u128 = 0;
        for b in self.0 {
            bits = (bits << 8) | b as u128;
        }
        bits <<= 2; // left-align 128 bits into a 130-bit field
        let mut out = [0u8; 26];
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = 125 - 5 * i as u32;
            let idx = ((bits >> shift) & 0x1F) as usize;
            *slot = ALPHABET[idx];
        }
        f.write_str(std::str::from_utf8(&out).expect("base32 alphabet is ASCII"))
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({self})")
    }
}
