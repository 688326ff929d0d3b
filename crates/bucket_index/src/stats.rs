//! Per-partition cardinalities, used to spot hashing skew.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::IndexConfig,
    error::Result,
    fanout::{gather, report_partial, Fanout},
    partitions::{BucketTable, Partition},
    store::Backend,
};

/// `max / avg` above this is considered unhealthy. Nothing enforces it.
pub const SKEW_THRESHOLD: f64 = 3.0;

/// Distribution of records over the partitions that answered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_records: u64,
    /// Partitions included in the figures below.
    pub partitions: usize,
    pub avg_per_partition: f64,
    pub min_per_partition: u64,
    pub max_per_partition: u64,
    pub empty_partitions: usize,
    /// First partition holding `min_per_partition` records.
    pub min_partition: Option<String>,
    /// First partition holding `max_per_partition` records.
    pub max_partition: Option<String>,
    pub per_partition: Option<BTreeMap<String, u64>>,
}

impl IndexStats {
    pub fn from_counts(counts: &[(&Partition, u64)], detail: bool) -> Self {
        let mut stats = Self {
            partitions: counts.len(),
            ..Default::default()
        };
        let mut min: Option<(&Partition, u64)> = None;
        let mut max: Option<(&Partition, u64)> = None;
        for &(partition, count) in counts {
            stats.total_records += count;
            if count == 0 {
                stats.empty_partitions += 1;
            }
            if min.map_or(true, |(_, lowest)| count < lowest) {
                min = Some((partition, count));
            }
            if max.map_or(true, |(_, highest)| count > highest) {
                max = Some((partition, count));
            }
        }
        if let (Some((low, lowest)), Some((high, highest))) = (min, max) {
            stats.min_per_partition = lowest;
            stats.max_per_partition = highest;
            stats.min_partition = Some(low.name.clone());
            stats.max_partition = Some(high.name.clone());
            stats.avg_per_partition = stats.total_records as f64 / counts.len() as f64;
        }
        if detail {
            stats.per_partition = Some(
                counts
                    .iter()
                    .map(|(partition, count)| (partition.name.clone(), *count))
                    .collect(),
            );
        }
        stats
    }

    /// `max / avg`, 0 for an empty index.
    pub fn skew_ratio(&self) -> f64 {
        if self.avg_per_partition == 0.0 {
            0.0
        } else {
            self.max_per_partition as f64 / self.avg_per_partition
        }
    }

    #[inline]
    pub fn is_skewed(&self) -> bool {
        self.skew_ratio() > SKEW_THRESHOLD
    }
}

/// Read-only cardinality sweep, batched like scans to bound the number of
/// requests in flight.
pub struct SkewDiagnostics<'a, S> {
    store: &'a S,
    table: &'a BucketTable,
    config: &'a IndexConfig,
}

impl<'a, S: Backend> SkewDiagnostics<'a, S> {
    pub fn new(store: &'a S, table: &'a BucketTable, config: &'a IndexConfig) -> Self {
        Self {
            store,
            table,
            config,
        }
    }

    /// Figures cover the partitions that answered, the others are listed in
    /// [Fanout::failed].
    pub async fn stats(&self, detail: bool) -> Result<Fanout<IndexStats>> {
        let mut counts = Vec::with_capacity(self.table.len());
        let mut failed = Vec::new();
        for batch in self.table.batches(self.config.scan_batch_size) {
            let gathered = gather("stats", batch, |partition| {
                self.store.cardinality(&partition.name)
            })
            .await;
            counts.extend(gathered.answered);
            failed.extend(gathered.failed);
        }
        report_partial("stats", &failed, self.table.len());
        Ok(Fanout::new(IndexStats::from_counts(&counts, detail), failed))
    }
}

#[cfg(test)]
mod tests {
    use super::IndexStats;
    use crate::{config::IndexConfig, partitions::BucketTable};

    #[test]
    fn summarize_counts() {
        let table = BucketTable::from_config(&IndexConfig::with_hash_chars(1)).unwrap();
        let counts: Vec<_> = table
            .partitions()
            .iter()
            .map(|partition| {
                let count = if partition.bucket == 3 { 40 } else { partition.bucket as u64 % 2 };
                (partition, count)
            })
            .collect();
        let stats = IndexStats::from_counts(&counts, false);
        // 7 odd buckets besides bucket 3 hold one record each
        assert_eq!(stats.total_records, 47);
        assert_eq!(stats.partitions, 16);
        assert_eq!(stats.empty_partitions, 8);
        assert_eq!(stats.min_per_partition, 0);
        assert_eq!(stats.min_partition.as_deref(), Some("idx:0"));
        assert_eq!(stats.max_per_partition, 40);
        assert_eq!(stats.max_partition.as_deref(), Some("idx:3"));
        assert!((stats.avg_per_partition - 47.0 / 16.0).abs() < f64::EPSILON);
        assert!(stats.is_skewed());
        assert!(stats.per_partition.is_none());

        let detailed = IndexStats::from_counts(&counts, true);
        let detail = detailed.per_partition.unwrap();
        assert_eq!(detail.len(), 16);
        assert_eq!(detail["idx:3"], 40);
    }

    #[test]
    fn even_and_empty() {
        let table = BucketTable::from_config(&IndexConfig::with_hash_chars(1)).unwrap();
        let even: Vec<_> = table.partitions().iter().map(|partition| (partition, 5)).collect();
        let stats = IndexStats::from_counts(&even, false);
        assert_eq!(stats.skew_ratio(), 1.0);
        assert!(!stats.is_skewed());

        let stats = IndexStats::from_counts(&[], true);
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.skew_ratio(), 0.0);
        assert_eq!(stats.min_partition, None);
        assert_eq!(stats.per_partition.map(|detail| detail.len()), Some(0));
    }
}

#[cfg(all(test, feature = "memory"))]
mod sweep_tests {
    use tokio::runtime::Builder;

    use super::SkewDiagnostics;
    use crate::{
        config::IndexConfig,
        partitions::BucketTable,
        store::{memory::MemoryBackend, OrderedSetStore},
    };

    #[test]
    fn sweep_skips_failed_partition() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let config = IndexConfig {
                scan_batch_size: 5,
                ..IndexConfig::with_hash_chars(1)
            };
            let table = BucketTable::from_config(&config).unwrap();
            let store = MemoryBackend::standalone();
            for i in 0..100 {
                let key = format!("user_{i:03}");
                store.insert_member(&table.partition_of(&key).name, &key).await.unwrap();
            }
            let sweep = SkewDiagnostics::new(&store, &table, &config);
            let complete = sweep.stats(true).await.unwrap();
            assert!(!complete.is_partial());
            assert_eq!(complete.total_records, 100);
            let detail = complete.per_partition.as_ref().unwrap();
            let broken = table.partitions()[2].name.clone();
            let lost = detail[&broken];

            store.fail_partition(&broken);
            let partial = sweep.stats(false).await.unwrap();
            assert!(partial.is_partial());
            assert_eq!(partial.partitions, 15);
            assert_eq!(partial.total_records, 100 - lost);
        });
    }
}
