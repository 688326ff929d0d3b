use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use vendor::{debug, info};

use crate::{
    codec,
    config::IndexConfig,
    count::Counter,
    error::{IndexError, Result},
    fanout::Fanout,
    keys::Keys,
    partitions::{BucketTable, Partition},
    scan::{Record, Scanner},
    stats::{IndexStats, SkewDiagnostics},
    store::{connection::Connection, Backend, Placement},
    write::{select_strategy, WriteMode, WriteStrategy},
};

/// Secondary index over a [Backend]: every record is stored under its key
/// and registered in one of `16^hash_chars` ordered-set partitions, so
/// ranges of keys can be scanned and counted.
///
/// The manager holds no mutable state of its own, concurrent calls only
/// share the backend. Calls racing on overlapping keys see whatever the
/// backend holds at the time, scans are not snapshots.
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use bucket_index::{config::IndexConfig, manager::IndexManager, store::memory::MemoryBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = Arc::new(MemoryBackend::standalone());
/// let index = IndexManager::new(store, IndexConfig::default()).await?;
/// index.add("user_001", b"alice").await?;
/// index.add("user_002", b"bob").await?;
/// let users = index.scan("user_001", None, 10).await?;
/// assert_eq!(users.len(), 2);
/// assert_eq!(*index.count("user_", None).await?, 2);
/// # Ok::<(), bucket_index::error::IndexError>(())
/// # }).unwrap();
/// ```
pub struct IndexManager<S> {
    store: Arc<S>,
    config: IndexConfig,
    table: BucketTable,
    writer: Box<dyn WriteStrategy>,
}

impl<S: Backend + 'static> IndexManager<S> {
    /// Validate `config`, enumerate the partitions and probe the backend
    /// once to pick the write path.
    pub async fn new(store: Arc<S>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let table = BucketTable::from_config(&config)?;
        let capabilities = store.probe().await?;
        let writer = select_strategy(store.clone(), capabilities, config.prefer_atomic);
        info!("index ready";
            "prefix" => &config.index_prefix,
            "partitions" => table.len(),
            "writes" => %writer.mode());
        Ok(Self {
            store,
            config,
            table,
            writer,
        })
    }

    /// Like [new](IndexManager::new), connecting `conn` first if needed.
    pub async fn from_connection(conn: &Connection<S>, config: IndexConfig) -> Result<Self> {
        let store = conn.get().await?;
        Self::new(store, config).await
    }

    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[inline]
    pub fn write_mode(&self) -> WriteMode {
        self.writer.mode()
    }

    #[inline]
    pub fn partitions(&self) -> &[Partition] {
        self.table.partitions()
    }

    #[inline]
    pub fn partition_of(&self, key: &str) -> &Partition {
        self.table.partition_of(key)
    }

    fn placement(&self, key: &str) -> Result<Placement> {
        if key.is_empty() {
            return Err(IndexError::validation("record key should not be empty"));
        }
        Ok(Placement::new(key, self.table.partition_of(key).name.as_str()))
    }

    /// Store `value` under `key` and index the key. Re-adding overwrites the
    /// value, membership stays single.
    ///
    /// On the best-effort path a failure may leave one of the two effects
    /// applied, see [WriteMode::BestEffort].
    pub async fn add<V: AsRef<[u8]>>(&self, key: &str, value: V) -> Result<()> {
        let placement = self.placement(key)?;
        self.writer.put(&placement, value.as_ref()).await
    }

    pub async fn add_encoded<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = codec::encode(value)?;
        self.add(key, encoded).await
    }

    #[inline]
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(key).await?)
    }

    pub async fn get_decoded<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete one key or many, in chunks of `delete_chunk_size` applied one
    /// after another. A failing chunk stops the call, chunks before it stay
    /// deleted. Returns the number of keys processed.
    pub async fn del<K: Into<Keys>>(&self, keys: K) -> Result<usize> {
        let placements = keys
            .into()
            .into_vec()
            .iter()
            .map(|key| self.placement(key))
            .collect::<Result<Vec<_>>>()?;
        for (at, chunk) in placements.chunks(self.config.delete_chunk_size).enumerate() {
            self.writer.remove(chunk).await?;
            debug!("deleted chunk"; "chunk" => at, "keys" => chunk.len());
        }
        Ok(placements.len())
    }

    /// Up to `limit` (1 to 1000) records ascending by key, from `start_key`
    /// up to `end_key` inclusive, or to the end of `start_key`'s namespace
    /// (`user_`, `order:`, ...) when no end is given.
    ///
    /// Partitions that fail are skipped and listed in the result, which is
    /// then incomplete. See [Fanout::is_partial].
    pub async fn scan(
        &self,
        start_key: &str,
        end_key: Option<&str>,
        limit: usize,
    ) -> Result<Fanout<Vec<Record>>> {
        Scanner::new(self.store.as_ref(), &self.table, &self.config)
            .scan(start_key, end_key, limit)
            .await
    }

    /// Exact number of indexed keys in the range, failed partitions count
    /// as zero.
    pub async fn count(&self, start_key: &str, end_key: Option<&str>) -> Result<Fanout<u64>> {
        Counter::new(self.store.as_ref(), &self.table)
            .count(start_key, end_key)
            .await
    }

    /// Cardinality of every partition, optionally including the per
    /// partition breakdown.
    pub async fn stats(&self, detail: bool) -> Result<Fanout<IndexStats>> {
        SkewDiagnostics::new(self.store.as_ref(), &self.table, &self.config)
            .stats(detail)
            .await
    }
}
