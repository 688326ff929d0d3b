//! In-process [Backend] keeping values in a hash map and partitions in
//! B-tree sets. Capabilities, outages and per-partition failures can be
//! switched at runtime, which makes it the test double of the index.

use std::{
    collections::BTreeSet,
    io::{Error, ErrorKind, Result},
    ops::Bound,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use fxhash::{FxHashMap, FxHashSet};
use vendor::prelude::lock::RwLock;

use crate::range::LexRange;

use super::{AtomicScript, Backend, Capabilities, OrderedSetStore, Placement, ScalarStore};

#[derive(Default)]
struct Inner {
    values: FxHashMap<String, Vec<u8>>,
    sets: FxHashMap<String, BTreeSet<String>>,
}

impl Inner {
    fn put(&mut self, placement: &Placement, value: &[u8]) {
        self.values.insert(placement.key.clone(), value.to_vec());
        self.sets
            .entry(placement.partition.clone())
            .or_default()
            .insert(placement.key.clone());
    }

    fn remove(&mut self, placement: &Placement) {
        self.values.remove(&placement.key);
        if let Some(set) = self.sets.get_mut(&placement.partition) {
            set.remove(&placement.key);
            if set.is_empty() {
                self.sets.remove(&placement.partition);
            }
        }
    }
}

pub struct MemoryBackend {
    inner: RwLock<Inner>,
    capabilities: Capabilities,
    unavailable: AtomicBool,
    failing: RwLock<FxHashSet<String>>,
    mget_calls: AtomicUsize,
    script_calls: AtomicUsize,
    widest_script: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_capabilities(Capabilities::STANDALONE)
    }
}

impl MemoryBackend {
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capabilities,
            unavailable: AtomicBool::new(false),
            failing: RwLock::new(FxHashSet::default()),
            mget_calls: AtomicUsize::new(0),
            script_calls: AtomicUsize::new(0),
            widest_script: AtomicUsize::new(0),
        }
    }

    /// Single node with scripting.
    #[inline]
    pub fn standalone() -> Self {
        Self::with_capabilities(Capabilities::STANDALONE)
    }

    /// Scripting that cannot span a record key and its partition.
    #[inline]
    pub fn sharded() -> Self {
        Self::with_capabilities(Capabilities::SHARDED)
    }

    #[inline]
    pub fn without_scripting() -> Self {
        Self::with_capabilities(Capabilities::default())
    }

    /// Fail every call from now on, as if the backend were down.
    #[inline]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail every call touching the set `partition`.
    pub fn fail_partition(&self, partition: &str) {
        self.failing.write().insert(partition.to_owned());
    }

    pub fn heal_partition(&self, partition: &str) {
        self.failing.write().remove(partition);
    }

    #[inline]
    pub fn mget_calls(&self) -> usize {
        self.mget_calls.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn script_calls(&self) -> usize {
        self.script_calls.load(Ordering::Relaxed)
    }

    /// Most keys touched by a single script so far.
    #[inline]
    pub fn widest_script(&self) -> usize {
        self.widest_script.load(Ordering::Relaxed)
    }

    /// Members of `set`, ascending.
    pub fn members(&self, set: &str) -> Vec<String> {
        self.inner
            .read()
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all sets holding `member`.
    pub fn sets_containing(&self, member: &str) -> Vec<String> {
        let mut found: Vec<_> = self
            .inner
            .read()
            .sets
            .iter()
            .filter(|(_, members)| members.contains(member))
            .map(|(name, _)| name.clone())
            .collect();
        found.sort();
        found
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::new(
                ErrorKind::ConnectionRefused,
                "memory backend is unavailable",
            ));
        }
        Ok(())
    }

    fn check_set(&self, set: &str) -> Result<()> {
        self.check()?;
        if self.failing.read().contains(set) {
            return Err(Error::new(
                ErrorKind::TimedOut,
                format!("partition {set} timed out"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ScalarStore for MemoryBackend {
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check()?;
        self.inner
            .write()
            .values
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.inner.read().values.get(key).cloned())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check()?;
        self.mget_calls.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        Ok(keys.iter().map(|key| inner.values.get(key).cloned()).collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.inner.write().values.remove(key).is_some())
    }
}

#[async_trait]
impl OrderedSetStore for MemoryBackend {
    async fn insert_member(&self, set: &str, member: &str) -> Result<bool> {
        self.check_set(set)?;
        Ok(self
            .inner
            .write()
            .sets
            .entry(set.to_owned())
            .or_default()
            .insert(member.to_owned()))
    }

    async fn remove_member(&self, set: &str, member: &str) -> Result<bool> {
        self.check_set(set)?;
        let mut inner = self.inner.write();
        let removed = match inner.sets.get_mut(set) {
            Some(members) => members.remove(member),
            None => false,
        };
        if inner.sets.get(set).is_some_and(|members| members.is_empty()) {
            inner.sets.remove(set);
        }
        Ok(removed)
    }

    async fn lex_range(&self, set: &str, range: &LexRange, limit: usize) -> Result<Vec<String>> {
        self.check_set(set)?;
        if range.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.read();
        let Some(members) = inner.sets.get(set) else {
            return Ok(Vec::new());
        };
        Ok(members
            .range::<str, _>((range.start.as_start(), Bound::Unbounded))
            .take_while(|member| range.end.admits_to(member))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn lex_count(&self, set: &str, range: &LexRange) -> Result<u64> {
        self.check_set(set)?;
        if range.is_empty() {
            return Ok(0);
        }
        let inner = self.inner.read();
        let Some(members) = inner.sets.get(set) else {
            return Ok(0);
        };
        Ok(members
            .range::<str, _>((range.start.as_start(), Bound::Unbounded))
            .take_while(|member| range.end.admits_to(member))
            .count() as u64)
    }

    async fn cardinality(&self, set: &str) -> Result<u64> {
        self.check_set(set)?;
        Ok(self
            .inner
            .read()
            .sets
            .get(set)
            .map_or(0, |members| members.len() as u64))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn probe(&self) -> Result<Capabilities> {
        self.check()?;
        Ok(self.capabilities)
    }

    async fn eval_atomic(&self, script: AtomicScript<'_>) -> Result<()> {
        self.check()?;
        if !self.capabilities.scripting {
            return Err(Error::new(ErrorKind::Unsupported, "scripting is disabled"));
        }
        self.script_calls.fetch_add(1, Ordering::Relaxed);
        self.widest_script
            .fetch_max(script.key_count(), Ordering::Relaxed);

        // all or nothing, refuse before touching anything
        match script {
            AtomicScript::Put { placement, .. } => self.check_set(&placement.partition)?,
            AtomicScript::Remove { placements } => {
                for placement in placements {
                    self.check_set(&placement.partition)?;
                }
            }
        }
        let mut inner = self.inner.write();
        match script {
            AtomicScript::Put { placement, value } => inner.put(placement, value),
            AtomicScript::Remove { placements } => {
                for placement in placements {
                    inner.remove(placement);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use tokio::runtime::Builder;

    use super::MemoryBackend;
    use crate::{
        range::{LexBound, LexRange},
        store::{AtomicScript, Backend, Capabilities, OrderedSetStore, Placement, ScalarStore},
    };

    #[test]
    fn lexicographic_queries() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = MemoryBackend::standalone();
            for member in ["a", "b", "ba", "bb", "c"] {
                assert!(store.insert_member("idx:0", member).await.unwrap());
            }
            assert!(!store.insert_member("idx:0", "a").await.unwrap());

            let range = LexRange::new(LexBound::included("b"), LexBound::excluded("c"));
            let found = store.lex_range("idx:0", &range, 10).await.unwrap();
            assert_eq!(found, vec!["b", "ba", "bb"]);
            assert_eq!(store.lex_range("idx:0", &range, 2).await.unwrap(), vec!["b", "ba"]);
            assert_eq!(store.lex_count("idx:0", &range).await.unwrap(), 3);
            assert_eq!(store.lex_count("idx:0", &LexRange::full()).await.unwrap(), 5);
            assert_eq!(store.cardinality("idx:0").await.unwrap(), 5);
            assert_eq!(store.cardinality("idx:1").await.unwrap(), 0);

            let reversed = LexRange::closed("c", "a");
            assert!(store.lex_range("idx:0", &reversed, 10).await.unwrap().is_empty());
        });
    }

    #[test]
    fn atomic_scripts() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = MemoryBackend::standalone();
            assert_eq!(store.probe().await.unwrap(), Capabilities::STANDALONE);
            let placement = Placement::new("user_1", "idx:3");
            store
                .eval_atomic(AtomicScript::Put {
                    placement: &placement,
                    value: b"v",
                })
                .await
                .unwrap();
            assert_eq!(store.get("user_1").await.unwrap(), Some(b"v".to_vec()));
            assert_eq!(store.members("idx:3"), vec!["user_1"]);

            store.fail_partition("idx:3");
            let placements = [placement.clone()];
            let removal = AtomicScript::Remove {
                placements: &placements,
            };
            assert!(store.eval_atomic(removal).await.is_err());
            // refused scripts leave no trace
            assert_eq!(store.len(), 1);

            store.heal_partition("idx:3");
            store.eval_atomic(removal).await.unwrap();
            assert!(store.is_empty());
            assert!(store.sets_containing("user_1").is_empty());
            assert_eq!(store.script_calls(), 3);
            assert_eq!(store.widest_script(), 2);
        });
    }

    #[test]
    fn scripting_disabled() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = MemoryBackend::without_scripting();
            let placement = Placement::new("k", "idx:0");
            let err = store
                .eval_atomic(AtomicScript::Put {
                    placement: &placement,
                    value: b"v",
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported);
        });
    }

    #[test]
    fn outage() {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = MemoryBackend::standalone();
            store.set("k", b"v").await.unwrap();
            store.set_unavailable(true);
            let err = store.get("k").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
            assert!(store.probe().await.is_err());
            store.set_unavailable(false);
            let fetched = store.mget(&["k".to_owned(), "x".to_owned()]).await.unwrap();
            assert_eq!(fetched, vec![Some(b"v".to_vec()), None]);
            assert_eq!(store.mget_calls(), 1);
        });
    }
}
