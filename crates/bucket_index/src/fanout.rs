//! Scatter a query over partitions and gather the answers.
//!
//! A partition that fails is logged and left out, the call still succeeds.
//! What was left out is reported in [Fanout::failed] so callers can tell a
//! complete answer from a degraded one.

use std::{future::Future, io, ops::Deref};

use futures::future::join_all;
use vendor::warn;

use crate::partitions::Partition;

/// A partition that did not answer during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    pub partition: String,
    pub kind: io::ErrorKind,
    pub message: String,
}

/// Result of a scatter-gather call and the partitions missing from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fanout<T> {
    pub value: T,
    pub failed: Vec<PartitionFailure>,
}

impl<T> Deref for Fanout<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> Fanout<T> {
    #[inline]
    pub fn new(value: T, failed: Vec<PartitionFailure>) -> Self {
        Self { value, failed }
    }

    /// True when at least one partition was treated as empty.
    #[inline]
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Fanout<U> {
        Fanout {
            value: f(self.value),
            failed: self.failed,
        }
    }
}

/// Answers of one gather round, in partition order.
pub(crate) struct Gathered<'a, T> {
    pub answered: Vec<(&'a Partition, T)>,
    pub failed: Vec<PartitionFailure>,
}

/// Issue `query` for every partition of `partitions` concurrently and wait
/// for all of them.
pub(crate) async fn gather<'a, T, F, Fut>(
    op: &'static str,
    partitions: &'a [Partition],
    query: F,
) -> Gathered<'a, T>
where
    F: Fn(&'a Partition) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let pending = partitions.iter().map(|partition| {
        let answer = query(partition);
        async move { (partition, answer.await) }
    });
    let mut gathered = Gathered {
        answered: Vec::with_capacity(partitions.len()),
        failed: Vec::new(),
    };
    for (partition, answer) in join_all(pending).await {
        match answer {
            Ok(value) => gathered.answered.push((partition, value)),
            Err(e) => {
                warn!("partition failed, treating it as empty";
                    "op" => op, "partition" => %partition, "error" => %e);
                gathered.failed.push(PartitionFailure {
                    partition: partition.name.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }
    gathered
}

/// Log once per call when a fan-out lost partitions.
pub(crate) fn report_partial(op: &'static str, failed: &[PartitionFailure], total: usize) {
    if !failed.is_empty() {
        warn!("partial result, failed partitions contributed nothing";
            "op" => op, "failed" => failed.len(), "partitions" => total);
    }
}
