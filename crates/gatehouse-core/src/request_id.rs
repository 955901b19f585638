//! Monotonic, lexicographically-sortable request identifiers.
//!
//! A request id is 26 characters over Crockford's Base32 alphabet. The
//! leading 10 characters encode the low 48 bits of the Unix millisecond
//! timestamp (big-endian); the trailing 16 are drawn from a
//! cryptographically strong source. Lexicographic order of ids generated
//! in the same process agrees with wall-clock order at millisecond
//! resolution, with ties broken arbitrarily by the random tail.

use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Crockford Base32 alphabet (no I, L, O, U). Ascending ASCII order, so
/// byte-wise comparison of encoded ids preserves numeric order.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Total id length in characters.
const ID_LEN: usize = 26;

/// Characters spent on the timestamp prefix.
const TIME_LEN: usize = 10;

/// Characters spent on the random tail.
const RAND_LEN: usize = 16;

/// Decode one Crockford Base32 character, rejecting anything outside the
/// canonical uppercase alphabet.
fn decode_char(c: u8) -> Option<u64> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u64)
}

/// A request-scoped identifier attached to every inbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh id from the current wall clock.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_parts(Utc::now().timestamp_millis(), &mut OsRng)
    }

    /// Build an id from an explicit millisecond timestamp and RNG.
    ///
    /// Only the low 48 bits of the timestamp are encoded.
    #[must_use]
    pub fn from_parts(timestamp_ms: i64, rng: &mut impl RngCore) -> Self {
        let ts = (timestamp_ms as u64) & 0xFFFF_FFFF_FFFF;
        let mut out = [0u8; ID_LEN];

        // 10 chars * 5 bits = 50 bits of capacity for a 48-bit value; the
        // top shift is 45, so nothing here can overflow.
        #[allow(clippy::arithmetic_side_effects)]
        for (i, slot) in out.iter_mut().take(TIME_LEN).enumerate() {
            let shift = (TIME_LEN - 1 - i) * 5;
            *slot = ALPHABET[((ts >> shift) & 0x1F) as usize];
        }

        let mut tail = [0u8; RAND_LEN];
        rng.fill_bytes(&mut tail);
        for (slot, byte) in out.iter_mut().skip(TIME_LEN).zip(tail) {
            // 32 divides 256, so masking keeps the distribution uniform.
            *slot = ALPHABET[(byte & 0x1F) as usize];
        }

        // Every byte came from ALPHABET, which is ASCII.
        Self(out.iter().map(|&b| char::from(b)).collect())
    }

    /// Parse a string as a request id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequestId`] if the input length is not
    /// 26 or it contains a character outside the alphabet.
    pub fn parse(value: &str) -> CoreResult<Self> {
        if value.len() != ID_LEN || !value.bytes().all(|b| decode_char(b).is_some()) {
            return Err(CoreError::InvalidRequestId(value.to_owned()));
        }
        Ok(Self(value.to_owned()))
    }

    /// Decode the millisecond timestamp embedded in an id string.
    ///
    /// Returns `None` for any input whose length is not 26 or that
    /// contains a character outside the alphabet.
    #[must_use]
    pub fn timestamp_of(value: &str) -> Option<DateTime<Utc>> {
        if value.len() != ID_LEN {
            return None;
        }
        let mut ts: u64 = 0;
        for b in value.bytes().take(TIME_LEN) {
            // ts stays below 2^50, so the shift-accumulate cannot overflow.
            #[allow(clippy::arithmetic_side_effects)]
            {
                ts = (ts << 5) | decode_char(b)?;
            }
        }
        // The random tail still has to be alphabet-valid.
        if !value.bytes().skip(TIME_LEN).all(|b| decode_char(b).is_some()) {
            return None;
        }
        Utc.timestamp_millis_opt(ts as i64).single()
    }

    /// The embedded timestamp of this id.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Self::timestamp_of(&self.0)
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
