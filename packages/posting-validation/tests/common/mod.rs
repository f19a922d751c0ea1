// Common test fixtures

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use posting_validation::testing::MockEngine;
use posting_validation::{PipelineConfig, RawContent, ValidationPipeline};

/// When every fixture was "fetched".
pub fn fetched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
}

/// A description of roughly `words` words with a bullet list.
pub fn long_description(words: usize) -> String {
    let sentence = "You will design build and operate the payment services that merchants rely on every day";
    let per_sentence = sentence.split_whitespace().count();
    let mut paragraphs = Vec::new();
    for _ in 0..words.div_ceil(per_sentence) {
        paragraphs.push(format!("<p>{sentence}.</p>"));
    }
    format!(
        "{}<ul><li>Own services end to end</li><li>Mentor engineers on the team</li></ul>",
        paragraphs.join("")
    )
}

fn job_posting_ld(title: &str, company: &str, valid_through: &str) -> serde_json::Value {
    serde_json::json!({
        "@context": "https://schema.org",
        "@type": "JobPosting",
        "title": title,
        "hiringOrganization": {"@type": "Organization", "name": company},
        "jobLocation": {"@type": "Place", "address": {"addressLocality": "Berlin", "addressCountry": "DE"}},
        "baseSalary": {"currency": "EUR", "value": {"minValue": 80000, "maxValue": 100000, "unitText": "YEAR"}},
        "datePosted": "2026-01-10",
        "validThrough": valid_through,
        "employmentType": "FULL_TIME",
        "identifier": {"@type": "PropertyValue", "value": "REQ-4411"},
        "description": long_description(400),
    })
}

fn linkedin_page(ld: &serde_json::Value, title: &str, company: &str, details: &str) -> RawContent {
    let body = format!(
        r#"<html><head>
        <title>{company} hiring {title} in Berlin, Germany | LinkedIn</title>
        <script type="application/ld+json">{ld}</script>
        </head><body>
        <h1>{title}</h1>
        <p>{company} · Berlin, Germany · Full-time</p>
        <h2>Responsibilities</h2>
        <p>Build and run payment services.</p>
        <h2>Requirements</h2>
        <ul><li>Five years of Rust or Go</li></ul>
        {details}
        <button>Easy Apply</button>
        </body></html>"#
    );
    RawContent::html("https://www.linkedin.com/jobs/view/3901234567", body).with_fetched_at(fetched_at())
}

/// A LinkedIn job page with schema.org `JobPosting` markup.
pub fn linkedin_posting(title: &str, company: &str, valid_through: &str) -> RawContent {
    let ld = job_posting_ld(title, company, valid_through);
    linkedin_page(&ld, title, company, "<p>Salary: EUR 80,000 - 100,000 per year</p>")
}

/// Scenario A content without pay or requisition details; the page says so.
pub fn posting_with_absent_details() -> RawContent {
    let title = "Senior Backend Engineer";
    let company = "Acme Corp";
    let mut ld = job_posting_ld(title, company, "2026-03-31");
    if let Some(fields) = ld.as_object_mut() {
        fields.remove("baseSalary");
        fields.remove("identifier");
    }
    linkedin_page(&ld, title, company, "<p>Salary: Not specified</p>\n        <p>Job ID: N/A</p>")
}

/// Scenario A content.
pub fn senior_backend_posting() -> RawContent {
    linkedin_posting("Senior Backend Engineer", "Acme Corp", "2026-03-31")
}

/// A company careers page whose rule score lands in the ambiguous band.
pub fn ambiguous_posting() -> RawContent {
    let body = r#"<html><head><title>Backend Engineer | Acme Corp</title></head><body>
        <h1>Backend Engineer</h1>
        <p>Company: Acme Corp</p>
        <p>Based in our Berlin office.</p>
        <h2>Responsibilities</h2>
        <p>You will design, build and operate the payment services that thousands of merchants rely on every day, together with product.</p>
        <h2>Requirements</h2>
        <ul><li>Five years of Rust or Go</li><li>Experience running services in production</li></ul>
        <a href="/apply">Apply now</a>
        </body></html>"#;
    RawContent::html("https://acme.com/jobs/backend-engineer", body).with_fetched_at(fetched_at())
}

pub fn pipeline_with(engine: MockEngine) -> (Arc<MockEngine>, ValidationPipeline) {
    let engine = Arc::new(engine);
    let pipeline = ValidationPipeline::new(PipelineConfig::default(), engine.clone())
        .expect("default config is valid");
    (engine, pipeline)
}
