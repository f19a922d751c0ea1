//! Forbidden placeholder values.
//!
//! Upstream failures tend to leave synthetic strings such as
//! "Unknown Company" behind. None of them may ever be surfaced as a field.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Values forbidden as the whole field, compared after normalization.
pub const FORBIDDEN_EXACT: &[&str] = &[
    "unknown",
    "unknown company",
    "unknown employer",
    "unknown position",
    "unknown title",
    "unknown job",
    "unknown location",
    "untitled",
    "untitled position",
    "n/a",
    "na",
    "none",
    "null",
    "nil",
    "undefined",
    "tbd",
    "tba",
    "not specified",
    "not available",
    "not provided",
    "company",
    "company name",
    "job title",
    "position",
    "title",
    "placeholder",
    "sample job",
    "test job",
    "pdf parsing failed",
    "parsing failed",
    "[object object]",
];

/// Fragments forbidden anywhere in a value.
pub const FORBIDDEN_FRAGMENTS: &[&str] = &[
    "pdf parsing failed",
    "parsing failed",
    "extraction failed",
    "failed to extract",
    "unknown company",
    "unknown position",
    "lorem ipsum",
    "[object object]",
    "no description available",
    "description not available",
];

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}|\$\{[^}]*\}|%[sd]\b").unwrap());

/// Matches values against the forbidden lists.
#[derive(Debug, Clone)]
pub struct PlaceholderDetector {
    exact: BTreeSet<String>,
    fragments: Vec<String>,
}

impl Default for PlaceholderDetector {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl PlaceholderDetector {
    /// Built-in lists plus `extra` exact values.
    pub fn new(extra: &[String]) -> Self {
        let exact = FORBIDDEN_EXACT
            .iter()
            .map(|v| normalize(v))
            .chain(extra.iter().map(|v| normalize(v)))
            .filter(|v| !v.is_empty())
            .collect();
        Self {
            exact,
            fragments: FORBIDDEN_FRAGMENTS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Whether `value` is a placeholder.
    pub fn is_forbidden(&self, value: &str) -> bool {
        let normalized = normalize(value);
        if normalized.is_empty() || self.exact.contains(&normalized) {
            return true;
        }
        self.fragments.iter().any(|f| normalized.contains(f.as_str())) || TEMPLATE_RE.is_match(value)
    }
}

/// Lowercase, collapse whitespace and trim surrounding punctuation.
fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '-' | '"' | '\'' | '*'))
        .trim()
        .to_string()
}
