//! `Partitions` routes every record key to exactly one ordered-set
//! partition. The routing code is the leading hex digits of the key's
//! SHA-256 digest, so keys spread evenly no matter how clustered their
//! lexicographic order is, and a range query has to visit every partition.

pub mod hasher;
pub mod table;

pub use hasher::KeyHasher;
pub use table::{BucketTable, Partition};
