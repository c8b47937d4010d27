//! Anonymization of client identifiers.
//!
//! Client IP addresses and user agents are never stored. They are replaced by
//! a short keyed hash so repeat downloads and submissions can be recognized
//! without keeping the raw value.
//!
//! # Example
//!
//! ```
//! use romhacks::privacy::Anonymizer;
//!
//! let anonymizer = Anonymizer::new("site salt");
//! let hash = anonymizer.hash("203.0.113.7");
//! assert_eq!(hash.len(), 16);
//! assert_eq!(hash, anonymizer.hash("203.0.113.7"));
//! ```

/// Key derivation context for client hashes.
const KEY_CONTEXT: &str = "romhacks 2024-05 client identifier anonymization";

/// Number of hex characters kept from each hash.
pub const HASH_LEN: usize = 16;

/// Keyed hasher for client identifiers.
#[derive(Clone)]
pub struct Anonymizer {
    key: [u8; 32],
}

impl Anonymizer {
    /// Create an anonymizer whose key is derived from `salt`.
    #[must_use]
    pub fn new(salt: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, salt.as_bytes()),
        }
    }

    /// Hash a value into [`HASH_LEN`] lowercase hex characters.
    #[must_use]
    pub fn hash(&self, value: &str) -> String {
        let digest = blake3::keyed_hash(&self.key, value.as_bytes());
        let mut hex = digest.to_hex().to_string();
        hex.truncate(HASH_LEN);
        hex
    }
}

impl std::fmt::Debug for Anonymizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anonymizer").finish_non_exhaustive()
    }
}
