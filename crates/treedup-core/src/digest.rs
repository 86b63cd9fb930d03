//! Content digest type.

use serde::{Deserialize, Serialize};

/// Width of a content digest in bytes (BLAKE3 output size).
pub const DIGEST_LEN: usize = 32;

/// Fixed-width content digest produced by the hashing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    /// Create a digest from raw bytes.
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Get the digest as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The leading eight digest bytes as a little-endian word.
    ///
    /// Directory fingerprints are XOR-folds of this word, so it is pinned
    /// little-endian to keep fingerprints reproducible across platforms.
    pub fn prefix_word(&self) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_hex() {
        let digest = Digest::new([0xab; 32]);
        assert_eq!(digest.to_hex().len(), 64);
        assert!(digest.to_hex().starts_with("abab"));
    }

    #[test]
    fn test_prefix_word_is_little_endian() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        bytes[7] = 0x80;
        bytes[8] = 0xff; // must not contribute
        let digest = Digest::new(bytes);
        assert_eq!(digest.prefix_word(), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_prefix_word_xor_cancels() {
        let a = Digest::new([0x11; 32]);
        assert_eq!(a.prefix_word() ^ a.prefix_word(), 0);
    }
}
