use std::{fmt::Display, ops::Bound};

use crate::error::{IndexError, Result};

/// One end of a lexicographic range.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum LexBound {
    Included(String),
    Excluded(String),
    /// `-`, below every member.
    Min,
    /// `+`, above every member.
    Max,
}

impl Display for LexBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Included(member) => write!(f, "[{member}"),
            Self::Excluded(member) => write!(f, "({member}"),
            Self::Min => write!(f, "-"),
            Self::Max => write!(f, "+"),
        }
    }
}

impl LexBound {
    #[inline]
    pub fn included<M: Into<String>>(member: M) -> Self {
        Self::Included(member.into())
    }

    #[inline]
    pub fn excluded<M: Into<String>>(member: M) -> Self {
        Self::Excluded(member.into())
    }

    /// Parse the store's wire syntax, e.g. `"[user_"`, `"(user`"` or `"-"`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.chars().next() {
            Some('[') => Ok(Self::Included(raw[1..].to_owned())),
            Some('(') => Ok(Self::Excluded(raw[1..].to_owned())),
            Some('-') if raw.len() == 1 => Ok(Self::Min),
            Some('+') if raw.len() == 1 => Ok(Self::Max),
            _ => Err(IndexError::validation(format!(
                "malformed lexicographic bound {raw:?}, expected `[`, `(`, `-` or `+`"
            ))),
        }
    }

    #[inline]
    pub fn member(&self) -> Option<&str> {
        match self {
            Self::Included(member) | Self::Excluded(member) => Some(member),
            _ => None,
        }
    }

    /// Whether `member` lies above this bound when used as range start.
    pub fn admits_from(&self, member: &str) -> bool {
        match self {
            Self::Included(start) => member >= start.as_str(),
            Self::Excluded(start) => member > start.as_str(),
            Self::Min => true,
            Self::Max => false,
        }
    }

    /// Whether `member` lies below this bound when used as range end.
    pub fn admits_to(&self, member: &str) -> bool {
        match self {
            Self::Included(end) => member <= end.as_str(),
            Self::Excluded(end) => member < end.as_str(),
            Self::Min => false,
            Self::Max => true,
        }
    }

    /// As a start bound of `BTreeSet::range`.
    pub fn as_start(&self) -> Bound<&str> {
        match self {
            Self::Included(member) => Bound::Included(member.as_str()),
            Self::Excluded(member) => Bound::Excluded(member.as_str()),
            Self::Min => Bound::Unbounded,
            // nothing is above `+`, callers check `LexRange::is_empty` first
            Self::Max => Bound::Unbounded,
        }
    }
}

/// A start and end bound pair over member strings.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct LexRange {
    pub start: LexBound,
    pub end: LexBound,
}

impl Display for LexRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.start, self.end)
    }
}

impl LexRange {
    #[inline]
    pub fn new(start: LexBound, end: LexBound) -> Self {
        Self { start, end }
    }

    /// `[start, end]`, both inclusive.
    #[inline]
    pub fn closed<S: Into<String>, E: Into<String>>(start: S, end: E) -> Self {
        Self::new(LexBound::included(start), LexBound::included(end))
    }

    /// Every member.
    #[inline]
    pub fn full() -> Self {
        Self::new(LexBound::Min, LexBound::Max)
    }

    #[inline]
    pub fn contains(&self, member: &str) -> bool {
        self.start.admits_from(member) && self.end.admits_to(member)
    }

    /// True when no string can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (LexBound::Max, _) | (_, LexBound::Min) => true,
            (LexBound::Min, _) | (_, LexBound::Max) => false,
            (LexBound::Included(s), LexBound::Included(e)) => s > e,
            (LexBound::Included(s), LexBound::Excluded(e))
            | (LexBound::Excluded(s), LexBound::Included(e))
            | (LexBound::Excluded(s), LexBound::Excluded(e)) => s >= e,
        }
    }
}
