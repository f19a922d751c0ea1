//! Deterministic extraction rules.
//!
//! Every rule reads values that are literally present in the content. None
//! of them fall back to a default when a field is missing.

use regex::Regex;
use std::sync::LazyLock;

use crate::extract::structured;
use crate::text;
use crate::types::candidate::{ExtractionCandidate, JobField};
use crate::types::classification::Platform;
use crate::types::content::RawContent;

pub const JSON_LD_CONFIDENCE: f32 = 0.95;
pub const PLATFORM_TITLE_CONFIDENCE: f32 = 0.85;
pub const META_CONFIDENCE: f32 = 0.8;
pub const LABEL_CONFIDENCE: f32 = 0.75;
pub const HEADING_CONFIDENCE: f32 = 0.7;
pub const TITLE_SPLIT_CONFIDENCE: f32 = 0.7;
pub const TITLE_SPLIT_COMPANY_CONFIDENCE: f32 = 0.6;
pub const PATTERN_CONFIDENCE: f32 = 0.6;
pub const DESCRIPTION_BODY_CONFIDENCE: f32 = 0.6;

const MAX_INLINE_CHARS: usize = 200;

static LINKEDIN_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<company>.+?) hiring (?P<title>.+?)(?: in (?P<location>.+?))? \| LinkedIn$")
        .unwrap()
});
static GLASSDOOR_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?) job in (?P<location>.+?) at (?P<company>.+?) \| Glassdoor$")
        .unwrap()
});
static GREENHOUSE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Job Application for (?P<title>.+?) at (?P<company>.+)$").unwrap()
});
static LEVER_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<company>[^-]+?) - (?P<title>.+)$").unwrap());

static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").unwrap());
static META_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:property|name)\s*=\s*["']([^"']+)["']"#).unwrap()
});
static META_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-•*]\s*)?(?P<label>[A-Za-z][A-Za-z #./]{1,30}?)\s*:\s*(?P<value>\S.*)$").unwrap()
});

static SALARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[$€£]\s?\d{1,3}(?:,\d{3})*(?:\.\d+)?k?(?:\s?(?:-|–|to)\s?[$€£]?\s?\d{1,3}(?:,\d{3})*(?:\.\d+)?k?)?(?:\s?(?:per|/|a)\s?(?:year|yr|annum|hour|hr|month))?",
    )
    .unwrap()
});
static REQUISITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:req(?:uisition)?|job)\s*(?:id|#|no\.?|number)\s*[:#]?\s*([A-Z0-9][A-Z0-9_-]{2,})")
        .unwrap()
});
static POSTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bposted\s+(?:on\s+)?(\d{4}-\d{2}-\d{2}|\d+\+?\s+(?:minutes?|hours?|days?|weeks?|months?)\s+ago|today|yesterday|[A-Z][a-z]{2,8}\.? \d{1,2},? \d{4})",
    )
    .unwrap()
});
static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fully remote|100% remote|remote[- ]first|remote \([^)]{2,40}\))").unwrap()
});
static DESCRIPTION_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^(?:about (?:the|this) (?:job|role|position|opportunity)|job description|description|the role|role overview|responsibilities|what you('|’)?ll do)\b",
    )
    .unwrap()
});

/// Every rule's candidates, strongest rules first.
pub fn all_rules(content: &RawContent, text: &str, platform: Platform) -> Vec<ExtractionCandidate> {
    let mut out = Vec::new();
    out.extend(json_ld(&content.body));
    let page_title = text::page_title(&content.body);
    if let Some(title) = page_title.as_deref() {
        out.extend(platform_title(title, platform));
    }
    out.extend(meta_tags(&content.body, platform));
    out.extend(labelled_lines(text));
    out.extend(heading(&content.body));
    if let Some(title) = page_title.as_deref() {
        out.extend(title_split(title, platform));
    }
    out.extend(regular_patterns(text));
    out.extend(description_body(text));

    out.retain(|c| acceptable(c, platform));
    out
}

/// Drop empty or oversized values and platform self-names.
fn acceptable(candidate: &ExtractionCandidate, platform: Platform) -> bool {
    let value = candidate.value.trim();
    if text::normalize_for_match(value).is_empty() {
        return false;
    }
    if candidate.field != JobField::Description && value.chars().count() > MAX_INLINE_CHARS {
        return false;
    }
    if candidate.field == JobField::Company {
        let lowered = value.to_lowercase();
        if platform.self_names().iter().any(|n| *n == lowered) {
            return false;
        }
    }
    true
}

/// schema.org `JobPosting` JSON-LD.
pub fn json_ld(html: &str) -> Vec<ExtractionCandidate> {
    let Some(ld) = structured::find_job_posting(html) else {
        return vec![];
    };
    let rule = "json_ld";
    [
        (JobField::Title, ld.title),
        (JobField::Company, ld.company),
        (JobField::Location, ld.location),
        (JobField::Salary, ld.salary),
        (JobField::PostedAt, ld.date_posted),
        (JobField::RequisitionId, ld.identifier),
        (JobField::Description, ld.description),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.map(|v| ExtractionCandidate::rule(field, v, JSON_LD_CONFIDENCE, rule)))
    .collect()
}

/// Page-title formats of the big job platforms.
pub fn platform_title(title: &str, platform: Platform) -> Vec<ExtractionCandidate> {
    let rule = "platform_title";
    let c = PLATFORM_TITLE_CONFIDENCE;
    let named = |re: &Regex| -> Vec<ExtractionCandidate> {
        let Some(caps) = re.captures(title) else {
            return vec![];
        };
        [
            (JobField::Title, "title"),
            (JobField::Company, "company"),
            (JobField::Location, "location"),
        ]
        .into_iter()
        .filter_map(|(field, group)| {
            caps.name(group)
                .map(|m| ExtractionCandidate::rule(field, m.as_str().trim(), c, rule))
        })
        .collect()
    };

    match platform {
        Platform::Linkedin => named(&*LINKEDIN_TITLE_RE),
        Platform::Glassdoor => named(&*GLASSDOOR_TITLE_RE),
        Platform::Greenhouse => named(&*GREENHOUSE_TITLE_RE),
        Platform::Lever => named(&*LEVER_TITLE_RE),
        Platform::Indeed => {
            // "Title - Location - Indeed.com" or "Title - Company - Location - Indeed.com"
            let parts: Vec<&str> = title.split(" - ").map(str::trim).collect();
            match parts.as_slice() {
                [t, location, suffix] if suffix.eq_ignore_ascii_case("indeed.com") => vec![
                    ExtractionCandidate::rule(JobField::Title, *t, c, rule),
                    ExtractionCandidate::rule(JobField::Location, *location, c, rule),
                ],
                [t, company, location, suffix] if suffix.eq_ignore_ascii_case("indeed.com") => vec![
                    ExtractionCandidate::rule(JobField::Title, *t, c, rule),
                    ExtractionCandidate::rule(JobField::Company, *company, c, rule),
                    ExtractionCandidate::rule(JobField::Location, *location, c, rule),
                ],
                _ => vec![],
            }
        }
        _ => vec![],
    }
}

/// Open Graph title and site name.
pub fn meta_tags(html: &str, platform: Platform) -> Vec<ExtractionCandidate> {
    let mut out = Vec::new();
    for tag in META_RE.find_iter(html) {
        let tag = tag.as_str();
        let Some(key) = META_KEY_RE.captures(tag).and_then(|c| c.get(1)) else {
            continue;
        };
        let Some(content) = META_CONTENT_RE
            .captures(tag)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
        else {
            continue;
        };
        let value = text::clean_inline(content.as_str());
        let field = match key.as_str().to_lowercase().as_str() {
            // Big boards format og:title with company and location.
            "og:title" | "twitter:title"
                if !matches!(platform, Platform::Linkedin | Platform::Indeed | Platform::Glassdoor) =>
            {
                JobField::Title
            }
            "og:site_name" => JobField::Company,
            _ => continue,
        };
        out.push(ExtractionCandidate::rule(field, value, META_CONFIDENCE, "meta_tag"));
    }
    out
}

fn label_field(label: &str) -> Option<JobField> {
    let label = label.trim().trim_end_matches('.').to_lowercase();
    let field = match label.as_str() {
        "job title" | "title" | "position" | "role" | "position title" => JobField::Title,
        "company" | "employer" | "organization" | "organisation" | "hiring company" => {
            JobField::Company
        }
        "location" | "job location" | "work location" | "office" | "office location" => {
            JobField::Location
        }
        "salary" | "salary range" | "compensation" | "pay" | "pay range" | "base salary" => {
            JobField::Salary
        }
        "posted" | "posted on" | "date posted" | "posting date" | "published" => JobField::PostedAt,
        "job id" | "req id" | "requisition id" | "requisition" | "job number" | "job #"
        | "req #" | "reference" | "job ref" | "job reference" => JobField::RequisitionId,
        _ => return None,
    };
    Some(field)
}

/// `Label: value` lines in the visible text.
pub fn labelled_lines(text: &str) -> Vec<ExtractionCandidate> {
    text.lines()
        .filter_map(|line| {
            let caps = LABEL_RE.captures(line.trim())?;
            let field = label_field(&caps["label"])?;
            Some(ExtractionCandidate::rule(
                field,
                caps["value"].trim(),
                LABEL_CONFIDENCE,
                "labelled_line",
            ))
        })
        .collect()
}

/// First `<h1>` as the title.
pub fn heading(html: &str) -> Vec<ExtractionCandidate> {
    H1_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| text::clean_inline(m.as_str()))
        .filter(|h| !h.is_empty())
        .map(|h| vec![ExtractionCandidate::rule(JobField::Title, h, HEADING_CONFIDENCE, "h1_heading")])
        .unwrap_or_default()
}

/// `<title>` split into title and company on `|`, `-` or ` at `.
pub fn title_split(title: &str, platform: Platform) -> Vec<ExtractionCandidate> {
    let self_names = platform.self_names();
    let parts: Vec<&str> = title
        .split(['|', '–'])
        .flat_map(|p| p.split(" - "))
        .flat_map(|p| p.split(" at "))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| {
            let lowered = p.to_lowercase();
            !self_names.iter().any(|n| lowered == *n || lowered.starts_with(&format!("{n}.")))
                && !matches!(lowered.as_str(), "careers" | "jobs" | "job" | "career")
        })
        .collect();

    match parts.as_slice() {
        [] => vec![],
        [only] => vec![ExtractionCandidate::rule(
            JobField::Title,
            *only,
            TITLE_SPLIT_CONFIDENCE,
            "title_split",
        )],
        [first, second, ..] => vec![
            ExtractionCandidate::rule(JobField::Title, *first, TITLE_SPLIT_CONFIDENCE, "title_split"),
            ExtractionCandidate::rule(
                JobField::Company,
                *second,
                TITLE_SPLIT_COMPANY_CONFIDENCE,
                "title_split",
            ),
        ],
    }
}

/// Salary ranges, requisition IDs, posting dates and remote markers.
pub fn regular_patterns(text: &str) -> Vec<ExtractionCandidate> {
    let mut out = Vec::new();
    let c = PATTERN_CONFIDENCE;
    if let Some(m) = SALARY_RE.find(text) {
        out.push(ExtractionCandidate::rule(JobField::Salary, m.as_str().trim(), c, "salary_pattern"));
    }
    if let Some(m) = REQUISITION_RE.captures(text).and_then(|caps| caps.get(1)) {
        out.push(ExtractionCandidate::rule(JobField::RequisitionId, m.as_str(), c, "requisition_pattern"));
    }
    if let Some(m) = POSTED_RE.captures(text).and_then(|caps| caps.get(1)) {
        out.push(ExtractionCandidate::rule(JobField::PostedAt, m.as_str(), c, "posted_pattern"));
    }
    if let Some(m) = REMOTE_RE.find(text) {
        out.push(ExtractionCandidate::rule(JobField::Location, m.as_str(), c, "remote_pattern"));
    }
    out
}

/// Body text from the first description heading, or the whole text.
///
/// Lines are kept verbatim, bullets included.
pub fn description_body(text: &str) -> Vec<ExtractionCandidate> {
    let body = match DESCRIPTION_START_RE.find(text) {
        Some(m) => &text[m.start()..],
        None => text,
    };
    let body = body.trim();
    if text::word_count(body) < 20 {
        return vec![];
    }
    vec![ExtractionCandidate::rule(
        JobField::Description,
        body,
        DESCRIPTION_BODY_CONFIDENCE,
        "description_body",
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(candidates: &[ExtractionCandidate], field: JobField) -> Vec<&str> {
        candidates
            .iter()
            .filter(|c| c.field == field)
            .map(|c| c.value.as_str())
            .collect()
    }

    #[test]
    fn test_linkedin_title() {
        let c = platform_title(
            "Acme Corp hiring Senior Backend Engineer in Berlin, Germany | LinkedIn",
            Platform::Linkedin,
        );
        assert_eq!(values(&c, JobField::Company), vec!["Acme Corp"]);
        assert_eq!(values(&c, JobField::Title), vec!["Senior Backend Engineer"]);
        assert_eq!(values(&c, JobField::Location), vec!["Berlin, Germany"]);
    }

    #[test]
    fn test_indeed_title() {
        let c = platform_title("Data Analyst - Austin, TX - Indeed.com", Platform::Indeed);
        assert_eq!(values(&c, JobField::Title), vec!["Data Analyst"]);
        assert_eq!(values(&c, JobField::Location), vec!["Austin, TX"]);
        assert!(values(&c, JobField::Company).is_empty());
    }

    #[test]
    fn test_greenhouse_title() {
        let c = platform_title("Job Application for Staff SRE at Globex", Platform::Greenhouse);
        assert_eq!(values(&c, JobField::Title), vec!["Staff SRE"]);
        assert_eq!(values(&c, JobField::Company), vec!["Globex"]);
    }

    #[test]
    fn test_meta_tags() {
        let html = r#"<meta property="og:title" content="Platform Engineer">
            <meta content='Initech' property='og:site_name'>
            <meta name="description" content="ignored">"#;
        let c = meta_tags(html, Platform::Company);
        assert_eq!(values(&c, JobField::Title), vec!["Platform Engineer"]);
        assert_eq!(values(&c, JobField::Company), vec!["Initech"]);
        assert!(meta_tags(html, Platform::Linkedin)
            .iter()
            .all(|c| c.field != JobField::Title));
    }

    #[test]
    fn test_labelled_lines() {
        let text = "Company: Acme Corp\n- Location: Berlin\nJob ID: R-1234\nNotes: none";
        let c = labelled_lines(text);
        assert_eq!(values(&c, JobField::Company), vec!["Acme Corp"]);
        assert_eq!(values(&c, JobField::Location), vec!["Berlin"]);
        assert_eq!(values(&c, JobField::RequisitionId), vec!["R-1234"]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_title_split_drops_platform_names() {
        let c = title_split("Backend Engineer | Acme | Careers", Platform::Company);
        assert_eq!(values(&c, JobField::Title), vec!["Backend Engineer"]);
        assert_eq!(values(&c, JobField::Company), vec!["Acme"]);

        let c = title_split("Backend Engineer - Indeed.com", Platform::Indeed);
        assert_eq!(values(&c, JobField::Title), vec!["Backend Engineer"]);
        assert!(values(&c, JobField::Company).is_empty());
    }

    #[test]
    fn test_regular_patterns() {
        let text = "Pay: competitive. Range $120,000 - $150,000 per year. Req #A-77. Posted 3 days ago.";
        let c = regular_patterns(text);
        assert_eq!(values(&c, JobField::Salary), vec!["$120,000 - $150,000 per year"]);
        assert_eq!(values(&c, JobField::RequisitionId), vec!["A-77"]);
        assert_eq!(values(&c, JobField::PostedAt), vec!["3 days ago"]);
    }

    #[test]
    fn test_description_starts_at_heading() {
        let text = "Acme\nNav\nAbout the role\nYou will build and run the services that move money for our customers every single day.\n- Rust\n- Postgres";
        let c = description_body(text);
        assert_eq!(c.len(), 1);
        assert!(c[0].value.starts_with("About the role"));
        assert!(c[0].value.ends_with("- Rust\n- Postgres"));
    }

    #[test]
    fn test_short_text_has_no_description() {
        assert!(description_body("Apply now").is_empty());
    }

    #[test]
    fn test_platform_self_name_is_not_company() {
        let html = r#"<html><head><title>Engineer | LinkedIn</title>
            <meta property="og:site_name" content="LinkedIn"></head></html>"#;
        let content = RawContent::html("https://www.linkedin.com/jobs/view/1", html);
        let c = all_rules(&content, "", Platform::Linkedin);
        assert!(values(&c, JobField::Company).is_empty());
    }
}
