//! Dual write and dual delete of a record value and its partition
//! membership.
//!
//! [ScriptedAtomicWrite] applies both effects in one server-side script and
//! keeps "value exists iff key is indexed" intact. [PipelinedBestEffortWrite]
//! issues the effects as independent concurrent requests: when one of them
//! fails the other may already be committed, leaving either an unindexed
//! value or an index entry without value. Racing writers of the same key
//! may also interleave their effects. Both are logged, neither is repaired.

use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use futures::future::{join, join_all};
use vendor::{error, info, warn};

use crate::{
    error::Result,
    store::{AtomicScript, Backend, Capabilities, Placement},
};

/// Which write path an index runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Both effects applied indivisibly by a script.
    Atomic,
    /// Effects applied independently, partial failures can break the
    /// value/index invariant.
    BestEffort,
}

impl Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Atomic => write!(f, "atomic"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

#[async_trait]
pub trait WriteStrategy: Send + Sync {
    fn mode(&self) -> WriteMode;

    /// Store the value and register the key in its partition.
    async fn put(&self, placement: &Placement, value: &[u8]) -> Result<()>;

    /// Delete the values and deregister the keys of one chunk.
    async fn remove(&self, placements: &[Placement]) -> Result<()>;
}

pub struct ScriptedAtomicWrite<S> {
    store: Arc<S>,
}

impl<S> ScriptedAtomicWrite<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Backend + 'static> WriteStrategy for ScriptedAtomicWrite<S> {
    #[inline]
    fn mode(&self) -> WriteMode {
        WriteMode::Atomic
    }

    async fn put(&self, placement: &Placement, value: &[u8]) -> Result<()> {
        self.store
            .eval_atomic(AtomicScript::Put { placement, value })
            .await?;
        Ok(())
    }

    async fn remove(&self, placements: &[Placement]) -> Result<()> {
        if placements.is_empty() {
            return Ok(());
        }
        self.store
            .eval_atomic(AtomicScript::Remove { placements })
            .await?;
        Ok(())
    }
}

pub struct PipelinedBestEffortWrite<S> {
    store: Arc<S>,
}

impl<S> PipelinedBestEffortWrite<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: Backend + 'static> WriteStrategy for PipelinedBestEffortWrite<S> {
    #[inline]
    fn mode(&self) -> WriteMode {
        WriteMode::BestEffort
    }

    async fn put(&self, placement: &Placement, value: &[u8]) -> Result<()> {
        let (stored, indexed) = join(
            self.store.set(&placement.key, value),
            self.store
                .insert_member(&placement.partition, &placement.key),
        )
        .await;
        match (stored, indexed) {
            (Ok(_), Ok(_)) => Ok(()),
            (Err(e), Ok(_)) => {
                error!("consistency risk: key indexed but value not stored";
                    "key" => &placement.key, "partition" => &placement.partition, "error" => %e);
                Err(e.into())
            }
            (Ok(_), Err(e)) => {
                error!("consistency risk: value stored but key not indexed";
                    "key" => &placement.key, "partition" => &placement.partition, "error" => %e);
                Err(e.into())
            }
            (Err(e), Err(_)) => Err(e.into()),
        }
    }

    async fn remove(&self, placements: &[Placement]) -> Result<()> {
        let pending = placements.iter().map(|placement| {
            join(
                self.store.delete(&placement.key),
                self.store
                    .remove_member(&placement.partition, &placement.key),
            )
        });
        let mut first_error = None;
        for (placement, (deleted, deindexed)) in placements.iter().zip(join_all(pending).await) {
            let outcome = match (deleted, deindexed) {
                (Ok(_), Ok(_)) => continue,
                (Err(e), Ok(_)) => {
                    error!("consistency risk: key deindexed but value kept";
                        "key" => &placement.key, "error" => %e);
                    e
                }
                (Ok(_), Err(e)) => {
                    error!("consistency risk: value deleted but key still indexed";
                        "key" => &placement.key,
                        "partition" => &placement.partition,
                        "error" => %e);
                    e
                }
                (Err(e), Err(_)) => e,
            };
            if first_error.is_none() {
                first_error = Some(outcome);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Pick the write path once, from the probed capabilities.
pub fn select_strategy<S: Backend + 'static>(
    store: Arc<S>,
    capabilities: Capabilities,
    prefer_atomic: bool,
) -> Box<dyn WriteStrategy> {
    if prefer_atomic && capabilities.supports_atomic_writes() {
        info!("using atomic scripted writes");
        return Box::new(ScriptedAtomicWrite::new(store));
    }
    warn!("consistency risk: best-effort writes, value and index may diverge on partial failure";
        "scripting" => capabilities.scripting,
        "cross_key_atomicity" => capabilities.cross_key_atomicity,
        "prefer_atomic" => prefer_atomic);
    Box::new(PipelinedBestEffortWrite::new(store))
}
