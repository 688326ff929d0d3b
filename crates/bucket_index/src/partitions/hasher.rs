use sha2::{Digest, Sha256};

use crate::{
    config::MAX_HASH_CHARS,
    error::{IndexError, Result},
};

/// Digest a record key into a routing code of `hash_chars` hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHasher {
    hash_chars: u8,
}

impl KeyHasher {
    pub fn new(hash_chars: u8) -> Result<Self> {
        if hash_chars == 0 || hash_chars > MAX_HASH_CHARS {
            return Err(IndexError::config(format!(
                "hash_chars must be 1 or 2, got {hash_chars}"
            )));
        }
        Ok(Self { hash_chars })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.hash_chars as usize
    }

    /// Number of distinct routing codes, `16^hash_chars`.
    #[inline]
    pub fn fan_out(&self) -> usize {
        1 << (4 * self.hash_chars as u32)
    }

    /// Routing code as a number in `0..fan_out()`.
    pub fn bucket_of(&self, key: &str) -> usize {
        let digest = Sha256::digest(key.as_bytes());
        // leading hex digits of the digest, one nibble per digit
        let leading = u16::from_be_bytes([digest[0], digest[1]]) as usize;
        leading >> (16 - 4 * self.hash_chars as usize)
    }

    #[inline]
    pub fn routing_code(&self, key: &str) -> String {
        self.format_code(self.bucket_of(key))
    }

    /// Zero padded lower-case hex of `bucket`.
    #[inline]
    pub fn format_code(&self, bucket: usize) -> String {
        format!("{:0width$x}", bucket, width = self.width())
    }
}
