//! Lexicographic ranges over partition members, expressed in the ordered-set
//! store's bound syntax: `[a` inclusive, `(a` exclusive, `-` and `+` for the
//! open ends.

pub mod bound;
pub mod infer;

pub use bound::{LexBound, LexRange};
pub use infer::{infer, namespace_of, successor, SEPARATORS};
