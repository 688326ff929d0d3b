//! Capabilities the index needs from the remote store. The transport,
//! retries and cluster topology live behind these traits, implementations
//! report transport failures as `io::Error`.

use std::io::{Error, ErrorKind, Result};

use async_trait::async_trait;

use crate::range::LexRange;

pub mod connection;
#[cfg(feature = "memory")]
pub mod memory;

/// Unordered key-value half of the store.
#[async_trait]
pub trait ScalarStore: Send + Sync {
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Values aligned with `keys`, `None` where a key is missing.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Ordered-set half of the store. Members share one weight, so they are
/// ordered purely by byte-wise string comparison.
#[async_trait]
pub trait OrderedSetStore: Send + Sync {
    /// Idempotent, returns whether the member was new.
    async fn insert_member(&self, set: &str, member: &str) -> Result<bool>;

    async fn remove_member(&self, set: &str, member: &str) -> Result<bool>;

    /// At most `limit` members within `range`, ascending.
    async fn lex_range(&self, set: &str, range: &LexRange, limit: usize) -> Result<Vec<String>>;

    async fn lex_count(&self, set: &str, range: &LexRange) -> Result<u64>;

    async fn cardinality(&self, set: &str) -> Result<u64>;
}

/// What the backend can guarantee, reported by [Backend::probe].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The backend runs server-side scripts.
    pub scripting: bool,
    /// A record key and its partition set live in the same transaction
    /// domain, false on sharded deployments that may place them apart.
    pub cross_key_atomicity: bool,
}

impl Capabilities {
    /// Single node with scripting, both effects of a write can be applied
    /// indivisibly.
    pub const STANDALONE: Self = Self {
        scripting: true,
        cross_key_atomicity: true,
    };

    /// Sharded deployment: scripting exists but cannot span the two keys.
    pub const SHARDED: Self = Self {
        scripting: true,
        cross_key_atomicity: false,
    };

    #[inline]
    pub fn supports_atomic_writes(&self) -> bool {
        self.scripting && self.cross_key_atomicity
    }
}

/// A record key together with the partition it is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placement {
    pub key: String,
    pub partition: String,
}

impl Placement {
    #[inline]
    pub fn new<K: Into<String>, P: Into<String>>(key: K, partition: P) -> Self {
        Self {
            key: key.into(),
            partition: partition.into(),
        }
    }
}

/// Scripts the index asks the backend to run as one indivisible operation.
#[derive(Debug, Clone, Copy)]
pub enum AtomicScript<'a> {
    /// Store `value` under `placement.key` and add the key to its partition.
    Put {
        placement: &'a Placement,
        value: &'a [u8],
    },
    /// Delete every key and remove it from its partition.
    Remove { placements: &'a [Placement] },
}

impl AtomicScript<'_> {
    /// Number of keys the script touches, two per placement.
    pub fn key_count(&self) -> usize {
        match self {
            Self::Put { .. } => 2,
            Self::Remove { placements } => placements.len() * 2,
        }
    }
}

/// The full store the index runs on.
#[async_trait]
pub trait Backend: ScalarStore + OrderedSetStore {
    /// Report capabilities, called once while constructing the index.
    async fn probe(&self) -> Result<Capabilities> {
        Ok(Capabilities::default())
    }

    /// Run `script` atomically. Only called when [probe](Backend::probe)
    /// reported scripting together with cross key atomicity.
    async fn eval_atomic(&self, _script: AtomicScript<'_>) -> Result<()> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "backend does not support atomic scripts",
        ))
    }
}
