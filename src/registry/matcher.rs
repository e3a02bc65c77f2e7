//! Invalidation pattern matching.
//!
//! A pattern is compiled once. Plain strings match by substring
//! containment; strings containing regex metacharacters match by regex
//! search. Matching is case-sensitive.

use std::fmt;

use regex::Regex;

use crate::error::{CacheError, Result};

const REGEX_METACHARACTERS: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// A compiled invalidation pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches keys containing the string
    Substring(String),
    /// Matches keys where the regex finds a match
    Regex(Regex),
}

impl Pattern {
    /// Compiles a pattern string, choosing substring or regex mode.
    pub fn compile(source: &str) -> Result<Self> {
        if !is_regex(source) {
            return Ok(Pattern::Substring(source.to_string()));
        }
        Regex::new(source)
            .map(Pattern::Regex)
            .map_err(|err| CacheError::InvalidPattern {
                pattern: source.to_string(),
                message: err.to_string(),
            })
    }

    /// Pattern source that matches `text` verbatim, escaping it if needed.
    pub fn literal(text: &str) -> String {
        if is_regex(text) {
            regex::escape(text)
        } else {
            text.to_string()
        }
    }

    pub fn is_match(&self, key: &str) -> bool {
        match self {
            Pattern::Substring(needle) => key.contains(needle.as_str()),
            Pattern::Regex(regex) => regex.is_match(key),
        }
    }

    /// The string this pattern was compiled from.
    pub fn source(&self) -> &str {
        match self {
            Pattern::Substring(needle) => needle,
            Pattern::Regex(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

fn is_regex(source: &str) -> bool {
    source.contains(REGEX_METACHARACTERS)
}

/// Returns the keys matched by `pattern`, preserving input order.
pub fn match_keys<'a, I>(pattern: &Pattern, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    keys.into_iter()
        .filter(|key| pattern.is_match(key))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_plain_string_is_substring() {
        let pattern = Pattern::compile("crimes:2024-01").unwrap();
        assert!(matches!(pattern, Pattern::Substring(_)));
        assert!(pattern.is_match("crimes:2024-01:type:burglary"));
        assert!(pattern.is_match("v2:crimes:2024-01"));
        assert!(!pattern.is_match("crimes:2024-02"));
    }

    #[test]
    fn test_metacharacters_use_regex() {
        let pattern = Pattern::compile("crimes:.*2024.*").unwrap();
        assert!(matches!(pattern, Pattern::Regex(_)));
        assert!(pattern.is_match("crimes:district-4:2024-03"));
        assert!(!pattern.is_match("stats:2024-03"));
    }

    #[test]
    fn test_anchored_regex() {
        let pattern = Pattern::compile("^stats:").unwrap();
        assert!(pattern.is_match("stats:summary"));
        assert!(!pattern.is_match("map:stats:summary"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let pattern = Pattern::compile("Burglary").unwrap();
        assert!(!pattern.is_match("type:burglary"));
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let err = Pattern::compile("crimes:(2024").unwrap_err();
        assert!(matches!(err, CacheError::InvalidPattern { ref pattern, .. } if pattern == "crimes:(2024"));
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let source = Pattern::literal("type:assault (aggravated)");
        let pattern = Pattern::compile(&source).unwrap();
        assert!(pattern.is_match("crimes:type:assault (aggravated):2024-01"));
        assert!(!pattern.is_match("crimes:type:assault aggravated"));

        assert_eq!(Pattern::literal("type:theft"), "type:theft");
    }

    #[test]
    fn test_match_keys_subset() {
        let live = keys(&["crimes:2024-01", "stats:2024-01", "crimes:2024-02"]);
        let pattern = Pattern::compile("2024-01").unwrap();
        assert_eq!(match_keys(&pattern, &live), keys(&["crimes:2024-01", "stats:2024-01"]));

        let none = Pattern::compile("1999").unwrap();
        assert!(match_keys(&none, &live).is_empty());
    }
}
