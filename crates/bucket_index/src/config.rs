use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Largest accepted routing-code width, every scan and count visits
/// `16^hash_chars` partitions.
pub const MAX_HASH_CHARS: u8 = 2;

/// Options recognised by [IndexManager](crate::manager::IndexManager).
/// Missing fields fall back to [Default] when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Namespace of the partition sets, partition ids are
    /// `index_prefix + hex routing code`.
    pub index_prefix: String,
    /// Width of the routing code in hex digits, 1 (16 partitions) or
    /// 2 (256 partitions).
    pub hash_chars: u8,
    /// Partitions queried concurrently per round trip in `scan` and `stats`.
    pub scan_batch_size: usize,
    /// Keys per multi-get when resolving scanned keys to values.
    pub mget_batch_size: usize,
    /// Keys per scripted or pipelined call in `del`.
    pub delete_chunk_size: usize,
    /// Use the backend's atomic script when it is available. When `false`
    /// the best-effort path is always taken.
    pub prefer_atomic: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_prefix: "idx:".to_owned(),
            hash_chars: 2,
            scan_batch_size: 50,
            mget_batch_size: 200,
            delete_chunk_size: 1000,
            prefer_atomic: true,
        }
    }
}

impl IndexConfig {
    /// Default config with the given routing-code width.
    pub fn with_hash_chars(hash_chars: u8) -> Self {
        Self {
            hash_chars,
            ..Default::default()
        }
    }

    #[inline]
    pub fn fan_out(&self) -> usize {
        16usize.pow(self.hash_chars as u32)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hash_chars == 0 || self.hash_chars > MAX_HASH_CHARS {
            return Err(IndexError::config(format!(
                "hash_chars must be 1 or 2, got {}",
                self.hash_chars
            )));
        }
        let sizes = [
            ("scan_batch_size", self.scan_batch_size),
            ("mget_batch_size", self.mget_batch_size),
            ("delete_chunk_size", self.delete_chunk_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(IndexError::config(format!("{name} should not be zero")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::IndexConfig;
    use crate::error::IndexError;

    #[test]
    fn defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.index_prefix, "idx:");
        assert_eq!(config.hash_chars, 2);
        assert_eq!(config.scan_batch_size, 50);
        assert_eq!(config.mget_batch_size, 200);
        assert_eq!(config.fan_out(), 256);
        assert!(config.validate().is_ok());
        assert_eq!(IndexConfig::with_hash_chars(1).fan_out(), 16);
    }

    #[test]
    fn reject_hash_chars() {
        for hash_chars in [0, 3, 4] {
            let config = IndexConfig::with_hash_chars(hash_chars);
            assert!(matches!(config.validate(), Err(IndexError::Config(_))));
        }
    }

    #[test]
    fn reject_zero_sizes() {
        let config = IndexConfig {
            mget_batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mget_batch_size"));
    }
}
