//! Input types handed to the pipeline by the fetch collaborator and the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::candidate::JobField;

/// How the body text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Raw HTML as served.
    Html,
    /// Text pulled out of a PDF by the fetch collaborator.
    PdfText,
    /// Text pasted in by a user.
    Manual,
}

/// Accessibility problem reported by the fetch collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchError {
    Timeout,
    Forbidden,
    Dns,
    Other,
}

/// Raw content describing a purported job opening.
///
/// Produced once by the fetch collaborator and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    /// Where the content came from.
    pub url: String,

    /// Raw body (HTML, extracted PDF text, or pasted text).
    pub body: String,

    /// How `body` was produced.
    pub content_kind: ContentKind,

    /// HTTP status of the fetch, if there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// When the content was fetched.
    pub fetched_at: DateTime<Utc>,

    /// Fetch-level failure, if the collaborator hit one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<FetchError>,
}

impl RawContent {
    /// Create raw content with minimal fields.
    pub fn new(url: impl Into<String>, body: impl Into<String>, content_kind: ContentKind) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_kind,
            http_status: None,
            fetched_at: Utc::now(),
            fetch_error: None,
        }
    }

    /// HTML content fetched with status 200.
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(url, body, ContentKind::Html).with_status(200)
    }

    /// Set the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Set the fetch timestamp.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Record a fetch failure.
    pub fn with_fetch_error(mut self, error: FetchError) -> Self {
        self.fetch_error = Some(error);
        self
    }

    /// Check if the body has any non-whitespace content.
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Host part of the URL, lowercased.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }
}

/// User-supplied field values.
///
/// Treated exactly like extraction candidates with `source = manual`; they
/// go through the same quality gate as everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOverrides {
    #[serde(default)]
    pub values: BTreeMap<JobField, String>,
}

impl FieldOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field. Blank values are ignored.
    pub fn with(mut self, field: JobField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(field, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
