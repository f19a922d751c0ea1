//! Classification types - what kind of content the pipeline is looking at.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    JobPosting,
    NonJob,
    Expired,
    LoginRequired,
    Ambiguous,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobPosting => "job_posting",
            Self::NonJob => "non_job",
            Self::Expired => "expired",
            Self::LoginRequired => "login_required",
            Self::Ambiguous => "ambiguous",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "job_posting" | "job" | "jobposting" => Some(Self::JobPosting),
            "non_job" | "nonjob" | "not_job" => Some(Self::NonJob),
            "expired" => Some(Self::Expired),
            "login_required" | "login" => Some(Self::LoginRequired),
            "ambiguous" | "unknown" => Some(Self::Ambiguous),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job platform, detected from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    Indeed,
    Glassdoor,
    Greenhouse,
    Lever,
    Workday,
    /// A company's own careers site.
    Company,
    Other,
}

impl Platform {
    /// Names the platform uses for itself, which are never a hiring company.
    pub fn self_names(&self) -> &'static [&'static str] {
        match self {
            Self::Linkedin => &["linkedin"],
            Self::Indeed => &["indeed", "indeed.com"],
            Self::Glassdoor => &["glassdoor"],
            Self::Greenhouse => &["greenhouse"],
            Self::Lever => &["lever"],
            Self::Workday => &["workday"],
            Self::Company | Self::Other => &[],
        }
    }
}

/// How a signal affects classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Adds weight to the job-posting score.
    Positive,
    /// Forces `non_job` and caps the job score.
    AntiPattern,
    /// Forces `expired`.
    Expiration,
    /// Forces `login_required`.
    LoginWall,
}

impl SignalKind {
    /// The category this kind forces outright, if any.
    pub fn forced_category(&self) -> Option<Category> {
        match self {
            Self::Positive => None,
            Self::AntiPattern => Some(Category::NonJob),
            Self::Expiration => Some(Category::Expired),
            Self::LoginWall => Some(Category::LoginRequired),
        }
    }
}

/// One evaluated signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub kind: SignalKind,
    pub weight: f32,
    pub matched: bool,
}

/// Result of classifying one piece of content.
///
/// Created once per run and never mutated. Never carries raw engine text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,

    /// Confidence in `category` (0.0 to 1.0).
    pub confidence: f32,

    /// Final job-posting score after caps and blending (0.0 to 1.0).
    pub job_score: f32,

    /// Every evaluated signal, in evaluation order.
    pub signals: Vec<Signal>,

    pub platform: Platform,

    /// Whether the engine was consulted for this result.
    pub engine_consulted: bool,

    /// The engine failed and the rule-only score was used.
    pub degraded: bool,
}

impl ClassificationResult {
    /// Signals that matched, in evaluation order.
    pub fn matched_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.matched)
    }

    /// Whether any anti-pattern matched.
    pub fn anti_pattern_fired(&self) -> bool {
        self.matched_signals()
            .any(|s| s.kind == SignalKind::AntiPattern)
    }

    pub fn is_job_posting(&self) -> bool {
        self.category == Category::JobPosting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("job_posting"), Some(Category::JobPosting));
        assert_eq!(Category::parse("Login-Required"), Some(Category::LoginRequired));
        assert_eq!(Category::parse("NON JOB"), Some(Category::NonJob));
        assert_eq!(Category::parse("recipe"), None);
    }

    #[test]
    fn test_forced_categories() {
        assert_eq!(SignalKind::Positive.forced_category(), None);
        assert_eq!(
            SignalKind::AntiPattern.forced_category(),
            Some(Category::NonJob)
        );
        assert_eq!(
            SignalKind::Expiration.forced_category(),
            Some(Category::Expired)
        );
    }
}
