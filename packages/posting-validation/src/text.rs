//! Text normalization shared by the classifier, extractor and gate.
//!
//! Only whitespace, markup and entities are touched. Wording, bullets and
//! line order are kept as they appear in the source.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::types::content::{ContentKind, RawContent};

static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head[^>]*>.*?</head>").unwrap());
static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|template|svg)[^>]*>.*?</(script|style|noscript|template|svg)>")
        .unwrap()
});
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|section|article|main|header|footer|nav|aside|h[1-6]|ul|ol|dl|dt|dd|tr|table|blockquote)(\s[^>]*)?>")
        .unwrap()
});
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static LI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li(\s[^>]*)?>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

/// Plain text of a piece of content.
///
/// HTML is stripped to text with one line per block; PDF and pasted text
/// only get whitespace cleanup.
pub fn visible_text(content: &RawContent) -> String {
    match content.content_kind {
        ContentKind::Html => html_to_text(&content.body),
        ContentKind::PdfText | ContentKind::Manual => tidy_lines(&decode_entities(&content.body)),
    }
}

/// Convert HTML to plain text. List items become `- ` bullet lines.
pub fn html_to_text(html: &str) -> String {
    let text = HEAD_RE.replace_all(html, "\n");
    let text = SCRIPT_RE.replace_all(&text, "\n");
    let text = COMMENT_RE.replace_all(&text, "");
    let text = LI_RE.replace_all(&text, "\n- ");
    let text = BR_RE.replace_all(&text, "\n");
    let text = BLOCK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    tidy_lines(&decode_entities(&text))
}

/// Text of the `<title>` element.
pub fn page_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| collapse_whitespace(&decode_entities(&TAG_RE.replace_all(m.as_str(), ""))))
        .filter(|t| !t.is_empty())
}

/// Strip tags and entities from an inline fragment and collapse whitespace.
pub fn clean_inline(fragment: &str) -> String {
    collapse_whitespace(&decode_entities(&TAG_RE.replace_all(fragment, " ")))
}

/// Strip tags from a block fragment, keeping line structure.
pub fn clean_block(fragment: &str) -> String {
    html_to_text(fragment)
}

/// Decode the common named entities and numeric references.
pub fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&bull;", "•")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace (including newlines) to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim each line, collapse inner spaces and keep at most one blank line.
pub fn tidy_lines(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank = false;
    for line in text.lines() {
        let line = SPACES_RE.replace_all(line.trim(), " ").to_string();
        if line.is_empty() || line == "-" {
            if !out.is_empty() && !blank {
                blank = true;
                out.push(String::new());
            }
            continue;
        }
        blank = false;
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Lowercased alphanumeric words separated by single spaces.
///
/// Used to compare values across sources regardless of punctuation or
/// markup.
pub fn normalize_for_match(text: &str) -> String {
    let lowered: String = decode_entities(text)
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    collapse_whitespace(&lowered.to_lowercase())
}

/// Whether `value` appears in `source` after normalization.
pub fn is_grounded(value: &str, normalized_source: &str) -> bool {
    let needle = normalize_for_match(value);
    if needle.is_empty() {
        return false;
    }
    // Pad so that "art" does not ground inside "start".
    format!(" {normalized_source} ").contains(&format!(" {needle} "))
}

/// Distinct normalized word tokens.
pub fn tokens(text: &str) -> BTreeSet<String> {
    normalize_for_match(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Jaccard overlap of two values' tokens.
pub fn token_agreement(a: &str, b: &str) -> f32 {
    let a = tokens(a);
    let b = tokens(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(&b).count();
    let total = a.union(&b).count();
    shared as f32 / total as f32
}

/// Word count, ignoring bullet markers.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .count()
}
