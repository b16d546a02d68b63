//! Bounded byte-string substitution over the metric name token

use serde::Serialize;

use crate::error::ConfigError;

/// Replaces occurrences of `old` with `new` in the metric name
///
/// At most `max` occurrences are replaced per record; `None` means all of
/// them. Replacement scans left to right and never revisits replaced
/// output, so an `old` that appears in `new` cannot loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewriter {
    old: Vec<u8>,
    new: Vec<u8>,
    max: Option<usize>,
}

impl Rewriter {
    /// Builds a rewriter; the search pattern must be non-empty
    pub fn new(old: &str, new: &str, max: Option<usize>) -> Result<Self, ConfigError> {
        if old.is_empty() {
            return Err(ConfigError::InvalidRewriter {
                reason: "search pattern must not be empty".to_string(),
            });
        }
        Ok(Self {
            old: old.as_bytes().to_vec(),
            new: new.as_bytes().to_vec(),
            max,
        })
    }

    /// Applies the substitution to a metric name
    #[must_use]
    pub fn apply(&self, name: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(name.len());
        let mut replaced = 0usize;
        let mut pos = 0usize;
        while pos < name.len() {
            let budget_left = self.max.map_or(true, |max| replaced < max);
            if budget_left && name[pos..].starts_with(&self.old) {
                out.extend_from_slice(&self.new);
                pos += self.old.len();
                replaced += 1;
            } else {
                out.push(name[pos]);
                pos += 1;
            }
        }
        out
    }

    /// Captures the declarative fields
    #[must_use]
    pub fn snapshot(&self) -> RewriterSnapshot {
        RewriterSnapshot {
            old: String::from_utf8_lossy(&self.old).into_owned(),
            new: String::from_utf8_lossy(&self.new).into_owned(),
            max: self.max,
        }
    }
}

/// Read-only view of a rewriter's declarative fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriterSnapshot {
    pub old: String,
    pub new: String,
    /// `None` means unbounded
    pub max: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_replacement() {
        let rw = Rewriter::new("prod.", "p.", Some(1)).unwrap();
        assert_eq!(rw.apply(b"prod.prod.svc"), b"p.prod.svc");
    }

    #[test]
    fn test_unbounded_replacement() {
        let rw = Rewriter::new("prod.", "p.", None).unwrap();
        assert_eq!(rw.apply(b"prod.prod.svc"), b"p.p.svc");
    }

    #[test]
    fn test_no_occurrence_is_identity() {
        let rw = Rewriter::new("xyz", "abc", None).unwrap();
        assert_eq!(rw.apply(b"foo.bar"), b"foo.bar");
    }

    #[test]
    fn test_replacement_does_not_rescan_output() {
        // "aa" -> "a" halves runs instead of collapsing them entirely
        let rw = Rewriter::new("aa", "a", None).unwrap();
        assert_eq!(rw.apply(b"aaaa"), b"aa");
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        assert!(matches!(
            Rewriter::new("", "x", None),
            Err(ConfigError::InvalidRewriter { .. })
        ));
    }

    #[test]
    fn test_zero_max_is_identity() {
        let rw = Rewriter::new("a", "b", Some(0)).unwrap();
        assert_eq!(rw.apply(b"aaa"), b"aaa");
    }

    fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        let mut count = 0;
        let mut pos = 0;
        while pos + needle.len() <= haystack.len() {
            if &haystack[pos..pos + needle.len()] == needle {
                count += 1;
                pos += needle.len();
            } else {
                pos += 1;
            }
        }
        count
    }

    proptest! {
        #[test]
        fn prop_bounded_replacement_never_exceeds_max(
            name in "[a-z.]{0,40}",
            max in 0usize..5,
        ) {
            let rw = Rewriter::new("a", "XY", Some(max)).unwrap();
            let out = rw.apply(name.as_bytes());
            prop_assert!(count_occurrences(&out, b"XY") <= max);
        }

        #[test]
        fn prop_identity_when_pattern_absent(name in "[b-z.]{0,40}") {
            let rw = Rewriter::new("a", "q", None).unwrap();
            prop_assert_eq!(rw.apply(name.as_bytes()), name.as_bytes());
        }
    }
}
