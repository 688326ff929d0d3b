//! Range scans over every partition.
//!
//! Partitions are queried in batches of `scan_batch_size`, concurrently
//! within a batch and one batch after another. After each batch the
//! candidate keys are merged, sorted and cut back to `limit`, so at most
//! `limit + scan_batch_size * limit` keys are held at any time. The
//! surviving keys are then resolved to values with concurrent multi-gets.
//!
//! A partition that fails is treated as empty, the scan then returns fewer
//! or different rows than a complete one would and reports the partition in
//! [Fanout::failed].

use futures::future::join_all;
use vendor::debug;

use crate::{
    config::IndexConfig,
    error::{IndexError, Result},
    fanout::{gather, report_partial, Fanout},
    partitions::BucketTable,
    range::{self, LexRange},
    store::Backend,
};

pub const DEFAULT_SCAN_LIMIT: usize = 100;
pub const MAX_SCAN_LIMIT: usize = 1000;

/// A key and its value as returned by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
}

pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > MAX_SCAN_LIMIT {
        return Err(IndexError::validation(format!(
            "scan limit must be within [1, {MAX_SCAN_LIMIT}], got {limit}"
        )));
    }
    Ok(())
}

/// The `limit` smallest keys folded in so far.
#[derive(Debug)]
pub(crate) struct Merged {
    limit: usize,
    keys: Vec<String>,
}

impl Merged {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            keys: Vec::with_capacity(limit),
        }
    }

    /// Re-sorting the whole accumulator is fine for limits up to
    /// `MAX_SCAN_LIMIT`, a bounded heap would only pay off beyond that.
    pub fn fold<I: IntoIterator<Item = String>>(&mut self, batch: I) {
        self.keys.extend(batch);
        self.keys.sort_unstable();
        self.keys.dedup();
        self.keys.truncate(self.limit);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }
}

pub struct Scanner<'a, S> {
    store: &'a S,
    table: &'a BucketTable,
    config: &'a IndexConfig,
}

impl<'a, S: Backend> Scanner<'a, S> {
    pub fn new(store: &'a S, table: &'a BucketTable, config: &'a IndexConfig) -> Self {
        Self {
            store,
            table,
            config,
        }
    }

    /// Up to `limit` records in `[start_key, end_key]`, or in the namespace of
    /// `start_key` from `start_key` on when no end is given, ascending by key.
    pub async fn scan(
        &self,
        start_key: &str,
        end_key: Option<&str>,
        limit: usize,
    ) -> Result<Fanout<Vec<Record>>> {
        validate_limit(limit)?;
        let range = range::infer(start_key, end_key)?;
        let keys = self.collect_keys(&range, limit).await;
        if keys.value.is_empty() {
            return Ok(keys.map(|_| Vec::new()));
        }
        let records = self.resolve(&keys.value).await?;
        Ok(Fanout::new(records, keys.failed))
    }

    /// Smallest `limit` keys in `range` over all partitions.
    async fn collect_keys(&self, range: &LexRange, limit: usize) -> Fanout<Vec<String>> {
        let mut merged = Merged::new(limit);
        let mut failed = Vec::new();
        for batch in self.table.batches(self.config.scan_batch_size) {
            let gathered = gather("scan", batch, |partition| {
                self.store.lex_range(&partition.name, range, limit)
            })
            .await;
            merged.fold(gathered.answered.into_iter().flat_map(|(_, keys)| keys));
            failed.extend(gathered.failed);
        }
        report_partial("scan", &failed, self.table.len());
        debug!("scan collected keys"; "range" => %range, "keys" => merged.len());
        Fanout::new(merged.into_keys(), failed)
    }

    /// Fetch values in concurrent multi-gets of `mget_batch_size` keys.
    /// Keys whose value vanished in between are dropped.
    async fn resolve(&self, keys: &[String]) -> Result<Vec<Record>> {
        let chunks: Vec<_> = keys.chunks(self.config.mget_batch_size).collect();
        let fetched = join_all(chunks.iter().map(|chunk| self.store.mget(chunk))).await;

        let mut records = Vec::with_capacity(keys.len());
        for (chunk, values) in chunks.into_iter().zip(fetched) {
            for (key, value) in chunk.iter().zip(values?) {
                match value {
                    Some(value) => records.push(Record {
                        key: key.clone(),
                        value,
                    }),
                    None => debug!("indexed key has no value, skipped"; "key" => key),
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_limit, Merged, MAX_SCAN_LIMIT};
    use crate::error::IndexError;

    #[test]
    fn limit_bounds() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(MAX_SCAN_LIMIT).is_ok());
        assert!(matches!(validate_limit(0), Err(IndexError::Validation(_))));
        assert!(matches!(validate_limit(1001), Err(IndexError::Validation(_))));
    }

    #[test]
    fn merge_keeps_smallest_keys() {
        let mut merged = Merged::new(3);
        merged.fold(["d", "b"].map(String::from));
        assert_eq!(merged.len(), 2);
        merged.fold(["e", "a", "c", "b"].map(String::from));
        assert_eq!(merged.len(), 3);
        merged.fold(["f"].map(String::from));
        assert_eq!(merged.into_keys(), vec!["a", "b", "c"]);
    }
}
