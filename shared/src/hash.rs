use num_bigint::BigUint;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 256-bit digest used to identify blocks and transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes the SHA-256 digest of the ASCII bytes of `data`.
    #[must_use]
    pub fn sha256(data: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    /// Computes the SHA-256 digest of raw bytes (used for leaf/parent hashing
    /// where the input is already hex-encoded text concatenated as bytes).
    #[must_use]
    pub fn sha256_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character lowercase hex string into a `Hash256`.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let bytes = hex::decode(s).ok()?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Some(Self(hash))
    }

    /// Tests whether a string is a syntactically valid 64-char SHA-256 hex digest.
    #[must_use]
    pub fn is_valid_hex(s: &str) -> bool {
        s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Interprets the digest as an unsigned big integer and checks the
    /// reciprocal-threshold proof-of-work condition: `1 / H < difficulty_number`.
    ///
    /// Equivalent to `H > 1 / difficulty_number`, computed over exact big
    /// integers rather than floating point to avoid precision loss for the
    /// 256-bit hash value.
    #[must_use]
    pub fn meets_difficulty(&self, difficulty_number: f64) -> bool {
        if difficulty_number <= 0.0 {
            return false;
        }
        let h = BigUint::parse_bytes(self.to_hex().as_bytes(), 16).unwrap_or_default();
        let threshold = match BigUint::from_f64((1.0 / difficulty_number).floor()) {
            Some(t) => t,
            None => return false,
        };
        h > threshold
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl TryFrom<&str> for Hash256 {
    type Error = crate::BlockchainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_hex(value).ok_or(crate::BlockchainError::InvalidHash(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_displays_as_64_zero_chars() {
        let hash = Hash256::zero();
        assert_eq!(hash.to_string().len(), 64);
        assert_eq!(hash.to_string(), "0".repeat(64));
    }

    #[test]
    fn sha256_is_deterministic_and_well_formed() {
        let a = Hash256::sha256("hello world");
        let b = Hash256::sha256("hello world");
        assert_eq!(a, b);
        assert_ne!(a, Hash256::zero());
        assert!(Hash256::is_valid_hex(&a.to_hex()));
    }

    #[test]
    fn sha256_known_vector() {
        // echo -n "abc" | sha256sum
        let hash = Hash256::sha256("abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_round_trip() {
        let hash = Hash256::sha256("round trip");
        let hex = hash.to_hex();
        let parsed = Hash256::from_hex(&hex).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Hash256::from_hex("not-hex").is_none());
        assert!(Hash256::from_hex(&"ab".repeat(31)).is_none());
    }

    #[test]
    fn easy_difficulty_is_almost_always_met() {
        // DIFFICULTY_NUMBER near the configured default: any reasonably large
        // 256-bit hash exceeds the tiny reciprocal threshold.
        let hash = Hash256::sha256("anything");
        assert!(hash.meets_difficulty(1.0 / 1e20));
    }

    #[test]
    fn zero_hash_never_meets_difficulty() {
        assert!(!Hash256::zero().meets_difficulty(1.0 / 1e20));
    }
}
