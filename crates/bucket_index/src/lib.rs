//! Bucket index is a client-side secondary index over a key-value store
//! whose lookups are unordered but which offers ordered sets with
//! lexicographic range queries, for example [IndexManager](crate::manager::IndexManager).
//! Record keys are hashed into `16` or `256` ordered-set partitions so no
//! single set becomes a hotspot, range scans and counts fan out to every
//! partition and merge the answers.
//! ### Features
//! **memory**: enable the in-process [MemoryBackend](crate::store::memory::MemoryBackend),
//! useful for tests and demos.
//!

pub mod codec;
pub mod config;
pub mod count;
pub mod error;
pub mod fanout;
pub mod keys;
pub mod manager;
pub mod partitions;
pub mod range;
pub mod scan;
pub mod stats;
pub mod store;
pub mod write;

pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use fanout::{Fanout, PartitionFailure};
pub use keys::Keys;
pub use manager::IndexManager;
pub use scan::Record;
pub use stats::IndexStats;
pub use write::WriteMode;
