use crate::error::{IndexError, Result};

use super::bound::{LexBound, LexRange};

/// Characters that close a key namespace, e.g. `user_`, `order:` or `tenant/`.
pub const SEPARATORS: [char; 5] = ['_', ':', '-', '/', '#'];

/// Leading namespace of `key`: an alphanumeric run followed by exactly one
/// separator, `"user_001"` gives `"user_"`.
pub fn namespace_of(key: &str) -> Option<&str> {
    let run = key
        .char_indices()
        .find(|(_, c)| !c.is_alphanumeric())
        .map(|(at, _)| at)?;
    if run == 0 {
        return None;
    }
    let separator = key[run..].chars().next()?;
    if SEPARATORS.contains(&separator) {
        Some(&key[..run + separator.len_utf8()])
    } else {
        None
    }
}

/// Smallest string that sorts after every string starting with `prefix`,
/// obtained by bumping the last character by one code point.
pub fn successor(prefix: &str) -> Option<String> {
    let last = prefix.chars().last()?;
    let next = match last {
        '\u{d7ff}' => '\u{e000}',
        c => char::from_u32(c as u32 + 1)?,
    };
    let mut bumped = prefix[..prefix.len() - last.len_utf8()].to_owned();
    bumped.push(next);
    Some(bumped)
}

/// Derive the lexicographic range of a scan or count.
///
/// With an explicit `end_key` both ends are inclusive. Without one, the
/// range runs from `start_key` (inclusive) to the end of its namespace
/// (exclusive). A key without namespace is rejected rather than scanned
/// unbounded.
pub fn infer(start_key: &str, end_key: Option<&str>) -> Result<LexRange> {
    if start_key.is_empty() {
        return Err(IndexError::validation("start key should not be empty"));
    }
    if let Some(end_key) = end_key {
        if end_key < start_key {
            return Err(IndexError::validation(format!(
                "malformed range, end {end_key:?} sorts before start {start_key:?}"
            )));
        }
        return Ok(LexRange::closed(start_key, end_key));
    }
    let namespace = namespace_of(start_key).ok_or_else(|| IndexError::RangeInference {
        key: start_key.to_owned(),
        reason: "no alphanumeric prefix followed by one of `_ : - / #`",
    })?;
    let upper = successor(namespace).ok_or_else(|| IndexError::RangeInference {
        key: start_key.to_owned(),
        reason: "namespace has no successor",
    })?;
    Ok(LexRange::new(
        LexBound::included(start_key),
        LexBound::Excluded(upper),
    ))
}

#[cfg(test)]
mod tests {
    use super::{infer, namespace_of, successor};
    use crate::{error::IndexError, range::LexBound};

    #[test]
    fn find_namespace() {
        assert_eq!(namespace_of("user_001"), Some("user_"));
        assert_eq!(namespace_of("order:42:item"), Some("order:"));
        assert_eq!(namespace_of("tenant/a/b"), Some("tenant/"));
        assert_eq!(namespace_of("doc#7"), Some("doc#"));
        assert_eq!(namespace_of("v2-item"), Some("v2-"));
        assert_eq!(namespace_of("café_1"), Some("café_"));
        assert_eq!(namespace_of("user_"), Some("user_"));
        assert_eq!(namespace_of("missing_prefix:"), Some("missing_"));

        assert_eq!(namespace_of("nosuchprefix"), None);
        assert_eq!(namespace_of("_leading"), None);
        assert_eq!(namespace_of("user.001"), None);
        assert_eq!(namespace_of(""), None);
    }

    #[test]
    fn bump_last_code_point() {
        assert_eq!(successor("user_").as_deref(), Some("user`"));
        assert_eq!(successor("order:").as_deref(), Some("order;"));
        assert_eq!(successor("a\u{d7ff}").as_deref(), Some("a\u{e000}"));
        assert_eq!(successor("é").as_deref(), Some("ê"));
        assert_eq!(successor("x\u{10ffff}"), None);
        assert_eq!(successor(""), None);
    }

    #[test]
    fn explicit_end_is_inclusive() {
        let range = infer("user_001", Some("user_005")).unwrap();
        assert_eq!(range.to_string(), "[user_001 [user_005");
        assert!(range.contains("user_005"));
        assert!(!range.contains("user_0050"));
        assert!(infer("k", Some("k")).unwrap().contains("k"));
    }

    #[test]
    fn inferred_end_covers_namespace() {
        let range = infer("user_003", None).unwrap();
        assert_eq!(range.start, LexBound::included("user_003"));
        assert_eq!(range.end, LexBound::excluded("user`"));
        assert!(range.contains("user_003"));
        assert!(range.contains("user_999"));
        assert!(range.contains("user_\u{4e2d}\u{6587}"));
        assert!(!range.contains("user_002"));
        assert!(!range.contains("users_1"));
    }

    #[test]
    fn reject_bare_prefix() {
        let err = infer("nosuchprefix", None).unwrap_err();
        assert!(matches!(err, IndexError::RangeInference { ref key, .. } if key == "nosuchprefix"));
        // an explicit end makes any key usable
        assert!(infer("nosuchprefix", Some("nosuchprefiy")).is_ok());
    }

    #[test]
    fn reject_malformed() {
        assert!(matches!(infer("", None), Err(IndexError::Validation(_))));
        assert!(matches!(infer("b", Some("a")), Err(IndexError::Validation(_))));
    }
}
