//! Signal tables for the content classifier.
//!
//! Each table is evaluated in order. Weights are planning estimates and
//! should be calibrated against labelled pages.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::types::classification::{Platform, SignalKind};

/// What part of the content a pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The full URL.
    Url,
    /// The URL path, lowercased.
    Path,
    /// Visible text of the page.
    Text,
    /// Raw body, markup included.
    Markup,
}

/// A named, weighted regular-expression signal.
pub struct PatternSignal {
    pub name: &'static str,
    pub kind: SignalKind,
    pub weight: f32,
    pub targets: &'static [Target],
    pub pattern: Regex,
}

impl PatternSignal {
    fn new(
        name: &'static str,
        kind: SignalKind,
        weight: f32,
        targets: &'static [Target],
        pattern: &str,
    ) -> Self {
        Self {
            name,
            kind,
            weight,
            targets,
            pattern: Regex::new(pattern).unwrap(),
        }
    }
}

/// Anti-patterns evaluated by pattern. The homepage check is structural and
/// lives in the classifier.
pub static ANTI_PATTERNS: LazyLock<Vec<PatternSignal>> = LazyLock::new(|| {
    use SignalKind::AntiPattern as A;
    vec![
        PatternSignal::new(
            "legal_page",
            A,
            0.9,
            &[Target::Path],
            r"/(privacy|privacy-policy|terms|terms-of-service|terms-and-conditions|tos|legal|cookies?|cookie-policy|gdpr|imprint|impressum)(/|\.|$)",
        ),
        PatternSignal::new(
            "ecommerce",
            A,
            0.8,
            &[Target::Path, Target::Text],
            r"(?i)(/(products?|shop|store|cart|checkout|collections)(/|$)|\b(add to cart|add to bag|proceed to checkout|shopping cart)\b)",
        ),
        PatternSignal::new(
            "blog_or_news",
            A,
            0.7,
            &[Target::Path],
            r"/(blog|news|articles?|press|press-releases?|stories)/",
        ),
        PatternSignal::new(
            "search_results",
            A,
            0.85,
            &[Target::Path, Target::Text],
            r"(?i)(^/(jobs|careers?|search|job-search)/?$|/jobs/search(/|$)|^/jobs/?(\?|$)|\b\d[\d,]*\+?\s+(jobs|results|openings)\s+(found|matching)\b)",
        ),
        PatternSignal::new(
            "bot_challenge",
            A,
            0.8,
            &[Target::Text, Target::Markup],
            r"(?i)(verify (that )?you are (a )?human|checking your browser|are you a robot|complete the captcha|cf-browser-verification|unusual traffic from your)",
        ),
    ]
});

/// Login-wall indicators.
pub static LOGIN_PATTERNS: LazyLock<Vec<PatternSignal>> = LazyLock::new(|| {
    vec![
        PatternSignal::new(
            "login_url",
            SignalKind::LoginWall,
            0.85,
            &[Target::Path],
            r"/(login|signin|sign-in|authwall|uas/login|account/login)(/|$)",
        ),
        PatternSignal::new(
            "login_form",
            SignalKind::LoginWall,
            0.8,
            &[Target::Text],
            r"(?i)(sign in to (view|see|apply|continue)|log ?in to (view|see|apply|continue)|join now to see|you must be (logged|signed) in|create an account to (view|apply))",
        ),
    ]
});

/// Expiration phrases.
pub static EXPIRATION_PATTERNS: LazyLock<Vec<PatternSignal>> = LazyLock::new(|| {
    vec![PatternSignal::new(
        "expired_phrase",
        SignalKind::Expiration,
        0.9,
        &[Target::Text],
        r"(?i)(no longer accepting applications|this (job|position|posting|role|vacancy) (has )?(expired|been filled|is closed|is no longer available)|job (posting )?is no longer available|position has been filled|applications (are )?(now )?closed|this job has been (removed|closed))",
    )]
});

/// Exact-match job page URLs per platform.
pub static PLATFORM_PATTERNS: LazyLock<Vec<(Platform, PatternSignal)>> = LazyLock::new(|| {
    use SignalKind::Positive as P;
    vec![
        (
            Platform::Linkedin,
            PatternSignal::new("linkedin_job_view", P, 0.35, &[Target::Url], r"(?i)linkedin\.com/jobs/view/"),
        ),
        (
            Platform::Indeed,
            PatternSignal::new(
                "indeed_job_view",
                P,
                0.35,
                &[Target::Url],
                r"(?i)indeed\.[a-z.]+/(viewjob|m/viewjob|rc/clk)|indeed\.[a-z.]+/.*[?&]jk=[0-9a-f]+",
            ),
        ),
        (
            Platform::Glassdoor,
            PatternSignal::new(
                "glassdoor_job_listing",
                P,
                0.3,
                &[Target::Url],
                r"(?i)glassdoor\.[a-z.]+/(job-listing/|partner/joblisting)",
            ),
        ),
        (
            Platform::Greenhouse,
            PatternSignal::new("greenhouse_job", P, 0.35, &[Target::Url], r"(?i)greenhouse\.io/[^/]+/jobs/\d+"),
        ),
        (
            Platform::Lever,
            PatternSignal::new("lever_job", P, 0.35, &[Target::Url], r"(?i)jobs\.lever\.co/[^/]+/[0-9a-f-]{8,}"),
        ),
        (
            Platform::Workday,
            PatternSignal::new("workday_job", P, 0.35, &[Target::Url], r"(?i)myworkdayjobs\.com/.*/job/"),
        ),
    ]
});

/// Generic careers path, used when no platform pattern matched.
pub static CAREERS_PATH: LazyLock<PatternSignal> = LazyLock::new(|| {
    PatternSignal::new(
        "careers_path",
        SignalKind::Positive,
        0.2,
        &[Target::Path],
        r"/(careers?|jobs?|positions?|openings?|vacanc(y|ies)|job-openings?)/[^/?#]+",
    )
});

/// Raw-markup fallback for JSON-LD blocks that do not parse.
pub static JSON_LD_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)"@type"\s*:\s*\[?\s*"JobPosting""#).unwrap());

pub static MICRODATA_MARKER: LazyLock<PatternSignal> = LazyLock::new(|| {
    PatternSignal::new(
        "microdata_job_posting",
        SignalKind::Positive,
        0.3,
        &[Target::Markup],
        r#"(?i)itemtype\s*=\s*["']https?://schema\.org/JobPosting"#,
    )
});

/// Job-content markers in the visible text.
pub static CONTENT_MARKERS: LazyLock<Vec<PatternSignal>> = LazyLock::new(|| {
    use SignalKind::Positive as P;
    vec![
        PatternSignal::new(
            "apply_action",
            P,
            0.15,
            &[Target::Text],
            r"(?i)\b(apply now|apply for this (job|position|role)|easy apply|submit (your )?application|apply today)\b",
        ),
        PatternSignal::new(
            "responsibilities_section",
            P,
            0.1,
            &[Target::Text],
            r"(?i)\b(responsibilities|what you('|’)?ll do|your role|key duties|the role)\b",
        ),
        PatternSignal::new(
            "requirements_section",
            P,
            0.1,
            &[Target::Text],
            r"(?i)\b(requirements|qualifications|what we('|’)?re looking for|must have|nice to have)\b",
        ),
        PatternSignal::new(
            "compensation",
            P,
            0.1,
            &[Target::Text],
            r"(?i)(\bsalary\b|\bcompensation\b|\bpay range\b|[$€£]\s?\d{2,3}(,\d{3}|k)|\bper hour\b|\bbenefits\b)",
        ),
        PatternSignal::new(
            "employment_type",
            P,
            0.05,
            &[Target::Text],
            r"(?i)\b(full[- ]time|part[- ]time|contract(or)? role|internship|permanent position)\b",
        ),
        PatternSignal::new(
            "role_title",
            P,
            0.1,
            &[Target::Text],
            r"(?i)\b(engineer|developer|manager|analyst|designer|scientist|specialist|coordinator|director|administrator|architect|consultant|nurse|technician|associate|representative|accountant)\b",
        ),
    ]
});

/// Host-level platform detection.
pub fn detect_platform(url: &Url) -> Platform {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let path = url.path().to_lowercase();

    if host.ends_with("linkedin.com") {
        Platform::Linkedin
    } else if host.contains("indeed.") {
        Platform::Indeed
    } else if host.contains("glassdoor.") {
        Platform::Glassdoor
    } else if host.ends_with("greenhouse.io") {
        Platform::Greenhouse
    } else if host.ends_with("lever.co") {
        Platform::Lever
    } else if host.ends_with("myworkdayjobs.com") {
        Platform::Workday
    } else if host.starts_with("careers.")
        || host.starts_with("jobs.")
        || CAREERS_PATH.pattern.is_match(&path)
    {
        Platform::Company
    } else {
        Platform::Other
    }
}
