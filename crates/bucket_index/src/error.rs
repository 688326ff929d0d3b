use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors surfaced by the index. Partition failures during a fan-out are not
/// errors, they are reported through [Fanout](crate::fanout::Fanout).
#[derive(Debug, Error)]
pub enum IndexError {
    /// Rejected configuration, only raised while constructing the index.
    #[error("invalid index config: {0}")]
    Config(String),

    /// Caller input out of range, e.g. scan limit or reversed bounds.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// No namespace could be derived from the start key, the caller has to
    /// pass an explicit end key.
    #[error("could not infer the end of range from {key:?}: {reason}")]
    RangeInference { key: String, reason: &'static str },

    /// Transport or backend failure, never retried by the index.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] io::Error),

    #[error("value codec: {0}")]
    Codec(#[from] bincode::Error),

    /// The lazily initialised connection was closed or failed to open.
    #[error("connection closed")]
    Closed,
}

impl IndexError {
    #[inline]
    pub(crate) fn validation<M: Into<String>>(msg: M) -> Self {
        Self::Validation(msg.into())
    }

    #[inline]
    pub(crate) fn config<M: Into<String>>(msg: M) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same call could succeed, i.e. the failure came
    /// from the backend and not from the request itself.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}
