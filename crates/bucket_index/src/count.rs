use crate::{
    error::Result,
    fanout::{gather, report_partial, Fanout},
    partitions::BucketTable,
    range,
    store::Backend,
};

/// Exact range counts, computed server side by every partition at once.
/// Counts only move a number per partition, so nothing is batched.
pub struct Counter<'a, S> {
    store: &'a S,
    table: &'a BucketTable,
}

impl<'a, S: Backend> Counter<'a, S> {
    pub fn new(store: &'a S, table: &'a BucketTable) -> Self {
        Self { store, table }
    }

    /// Number of keys in the range [infer](crate::range::infer) derives
    /// from the bounds. Failed partitions count as zero and are listed in
    /// the returned [Fanout].
    pub async fn count(&self, start_key: &str, end_key: Option<&str>) -> Result<Fanout<u64>> {
        let range = range::infer(start_key, end_key)?;
        let gathered = gather("count", self.table.partitions(), |partition| {
            self.store.lex_count(&partition.name, &range)
        })
        .await;
        report_partial("count", &gathered.failed, self.table.len());
        let total = gathered.answered.iter().map(|(_, count)| count).sum();
        Ok(Fanout::new(total, gathered.failed))
    }
}
