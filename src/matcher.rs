//! Metric-name matching predicate
//!
//! A matcher combines an optional byte prefix, an optional substring and an
//! optional regular expression. All configured components must accept the
//! name; components left empty match vacuously, so the empty matcher
//! accepts everything.

use regex::bytes::Regex;
use serde::Serialize;

use crate::error::ConfigError;

/// Predicate over a metric name
#[derive(Debug, Clone)]
pub struct Matcher {
    prefix: String,
    sub: String,
    pattern: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Builds a matcher from its declarative components
    ///
    /// An empty string disables a component. Compiling a bad regex is the
    /// only failure.
    pub fn new(prefix: &str, sub: &str, pattern: &str) -> Result<Self, ConfigError> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source: Box::new(source),
                })?,
            )
        };
        Ok(Self {
            prefix: prefix.to_string(),
            sub: sub.to_string(),
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// A matcher that accepts every name
    #[must_use]
    pub fn match_all() -> Self {
        Self {
            prefix: String::new(),
            sub: String::new(),
            pattern: String::new(),
            regex: None,
        }
    }

    /// Builds a matcher matching names starting with `prefix`
    #[must_use]
    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            sub: String::new(),
            pattern: String::new(),
            regex: None,
        }
    }

    /// Tests the metric name against every configured component
    #[must_use]
    pub fn matches(&self, name: &[u8]) -> bool {
        if !self.prefix.is_empty() && !name.starts_with(self.prefix.as_bytes()) {
            return false;
        }
        if !self.sub.is_empty() && !contains(name, self.sub.as_bytes()) {
            return false;
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(name) {
                return false;
            }
        }
        true
    }

    /// The configured prefix component, empty when disabled
    #[must_use]
    pub fn prefix_spec(&self) -> &str {
        &self.prefix
    }

    /// The configured substring component, empty when disabled
    #[must_use]
    pub fn sub_spec(&self) -> &str {
        &self.sub
    }

    /// The configured regex source, empty when disabled
    #[must_use]
    pub fn regex_spec(&self) -> &str {
        &self.pattern
    }

    /// Captures the declarative fields
    #[must_use]
    pub fn snapshot(&self) -> MatcherSnapshot {
        MatcherSnapshot {
            prefix: self.prefix.clone(),
            sub: self.sub.clone(),
            regex: self.pattern.clone(),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::match_all()
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.sub == other.sub && self.pattern == other.pattern
    }
}

impl Eq for Matcher {}

/// Read-only view of a matcher's declarative fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatcherSnapshot {
    pub prefix: String,
    pub sub: String,
    pub regex: String,
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matcher_accepts_everything() {
        let matcher = Matcher::match_all();
        assert!(matcher.matches(b"foo.bar"));
        assert!(matcher.matches(b""));
    }

    #[test]
    fn test_prefix_component() {
        let matcher = Matcher::new("foo.", "", "").unwrap();
        assert!(matcher.matches(b"foo.bar"));
        assert!(!matcher.matches(b"bar.foo"));
    }

    #[test]
    fn test_substring_component() {
        let matcher = Matcher::new("", "cpu", "").unwrap();
        assert!(matcher.matches(b"host.cpu.idle"));
        assert!(!matcher.matches(b"host.mem.free"));
    }

    #[test]
    fn test_regex_component() {
        let matcher = Matcher::new("", "", r"^servers\.\w+\.load$").unwrap();
        assert!(matcher.matches(b"servers.web1.load"));
        assert!(!matcher.matches(b"servers.web1.cpu"));
    }

    #[test]
    fn test_all_components_must_match() {
        let matcher = Matcher::new("servers.", "load", r"\d+").unwrap();
        assert!(matcher.matches(b"servers.web1.load"));
        // prefix and regex hold, substring does not
        assert!(!matcher.matches(b"servers.web1.cpu"));
        // substring and regex hold, prefix does not
        assert!(!matcher.matches(b"hosts.web1.load"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let result = Matcher::new("", "", "(unclosed");
        assert!(matches!(result, Err(ConfigError::InvalidRegex { .. })));
    }

    #[test]
    fn test_snapshot_carries_declarative_fields() {
        let matcher = Matcher::new("a.", "b", "c$").unwrap();
        let snap = matcher.snapshot();
        assert_eq!(snap.prefix, "a.");
        assert_eq!(snap.sub, "b");
        assert_eq!(snap.regex, "c$");
    }
}
