use std::fmt::Display;

use crate::{config::IndexConfig, error::Result};

use super::hasher::KeyHasher;

/// One ordered-set container of the index, named
/// `index_prefix + routing code`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    pub bucket: usize,
    pub name: String,
}

impl Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl AsRef<str> for Partition {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Every partition of the index, enumerated once at construction and
/// immutable afterwards, so it can be shared by concurrent calls freely.
#[derive(Debug, Clone)]
pub struct BucketTable {
    prefix: String,
    hasher: KeyHasher,
    partitions: Vec<Partition>,
}

impl BucketTable {
    pub fn new<P: Into<String>>(prefix: P, hasher: KeyHasher) -> Self {
        let prefix = prefix.into();
        let partitions = (0..hasher.fan_out())
            .map(|bucket| Partition {
                bucket,
                name: format!("{prefix}{}", hasher.format_code(bucket)),
            })
            .collect();
        Self {
            prefix,
            hasher,
            partitions,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let hasher = KeyHasher::new(config.hash_chars)?;
        Ok(Self::new(config.index_prefix.as_str(), hasher))
    }

    #[inline]
    pub fn hasher(&self) -> &KeyHasher {
        &self.hasher
    }

    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// All partitions ordered by routing code.
    #[inline]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// The only partition that may hold `key`.
    #[inline]
    pub fn partition_of(&self, key: &str) -> &Partition {
        &self.partitions[self.hasher.bucket_of(key)]
    }

    /// Resolve a routing code such as `"0f"` to its partition.
    pub fn by_code(&self, code: &str) -> Option<&Partition> {
        if code.len() != self.hasher.width() || !code.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let bucket = usize::from_str_radix(code, 16).ok()?;
        self.partitions.get(bucket)
    }

    /// Walk the partitions in groups of at most `batch_size`.
    #[inline]
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Partition> {
        self.partitions.chunks(batch_size.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::BucketTable;
    use crate::{config::IndexConfig, error::IndexError, partitions::KeyHasher};

    #[test]
    fn enumerate_partitions() {
        let table = BucketTable::from_config(&IndexConfig::default()).unwrap();
        assert_eq!(table.len(), 256);
        assert_eq!(table.partitions()[0].name, "idx:00");
        assert_eq!(table.partitions()[15].name, "idx:0f");
        assert_eq!(table.partitions()[255].name, "idx:ff");

        let narrow = BucketTable::new("users:", KeyHasher::new(1).unwrap());
        let names: Vec<_> = narrow.partitions().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "users:0");
        assert_eq!(names[15], "users:f");
    }

    #[test]
    fn route_key_to_its_partition() {
        let table = BucketTable::from_config(&IndexConfig::default()).unwrap();
        for i in 0..64 {
            let key = format!("order:{i}");
            let partition = table.partition_of(&key);
            let code = table.hasher().routing_code(&key);
            assert_eq!(partition.name, format!("idx:{code}"));
            assert_eq!(table.by_code(&code), Some(partition));
        }
        assert_eq!(table.by_code("zz"), None);
        assert_eq!(table.by_code("0"), None);
        // only bare hex digits name a partition
        assert_eq!(table.by_code("+f"), None);
        assert_eq!(table.by_code("-1"), None);
        assert_eq!(table.by_code("0F").map(|p| p.name.as_str()), Some("idx:0f"));
    }

    #[test]
    fn batches_cover_all_partitions() {
        let table = BucketTable::from_config(&IndexConfig::default()).unwrap();
        let sizes: Vec<_> = table.batches(50).map(|batch| batch.len()).collect();
        assert_eq!(sizes, vec![50, 50, 50, 50, 50, 6]);
    }

    #[test]
    fn reject_wide_fan_out() {
        let config = IndexConfig::with_hash_chars(3);
        assert!(matches!(BucketTable::from_config(&config), Err(IndexError::Config(_))));
    }
}
