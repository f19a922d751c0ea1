//! schema.org `JobPosting` JSON-LD reader.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::text;

static LD_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .unwrap()
});

/// Fields read from a `JobPosting` JSON-LD block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPostingLd {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub date_posted: Option<String>,
    pub valid_through: Option<DateTime<Utc>>,
    pub identifier: Option<String>,
    pub description: Option<String>,
}

/// Find and read the first `JobPosting` object in the page's JSON-LD.
///
/// Malformed blocks are skipped.
pub fn find_job_posting(html: &str) -> Option<JobPostingLd> {
    LD_JSON_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok())
        .find_map(|value| find_posting_node(&value).map(read_posting))
}

fn find_posting_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_posting_node),
        Value::Object(map) => {
            if is_job_posting_type(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph").and_then(find_posting_node)
        }
        _ => None,
    }
}

fn is_job_posting_type(kind: Option<&Value>) -> bool {
    match kind {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("JobPosting"),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .any(|k| k.as_str().is_some_and(|s| s.eq_ignore_ascii_case("JobPosting"))),
        _ => false,
    }
}

fn read_posting(node: &Value) -> JobPostingLd {
    JobPostingLd {
        title: string_at(node, "title").or_else(|| string_at(node, "name")),
        company: node.get("hiringOrganization").and_then(name_of),
        location: read_location(node),
        salary: node.get("baseSalary").and_then(read_salary),
        date_posted: string_at(node, "datePosted"),
        valid_through: string_at(node, "validThrough").and_then(|s| parse_date(&s)),
        identifier: node.get("identifier").and_then(|id| match id {
            Value::Object(_) => string_at(id, "value").or_else(|| string_at(id, "name")),
            other => scalar(other),
        }),
        description: node
            .get("description")
            .and_then(Value::as_str)
            .map(|d| text::clean_block(&text::decode_entities(d)))
            .filter(|d| !d.is_empty()),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(text::clean_inline(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_at(node: &Value, key: &str) -> Option<String> {
    node.get(key).and_then(scalar)
}

fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(name_of),
        Value::Object(_) => string_at(value, "name"),
        other => scalar(other),
    }
}

/// Most specific address part, verbatim.
fn read_location(node: &Value) -> Option<String> {
    let place = match node.get("jobLocation") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    }?;
    let address = place.get("address").unwrap_or(place);
    match address {
        Value::Object(_) => ["addressLocality", "addressRegion", "addressCountry"]
            .iter()
            .find_map(|k| address.get(*k).and_then(name_of)),
        other => scalar(other),
    }
}

/// A single verbatim amount. Ranges are left to the page text.
fn read_salary(salary: &Value) -> Option<String> {
    match salary {
        Value::Object(_) => match salary.get("value")? {
            value @ Value::Object(_) => string_at(value, "value"),
            other => scalar(other),
        },
        other => scalar(other),
    }
}

/// Parse an ISO date or date-time. Bare dates run to the end of that day.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
}
