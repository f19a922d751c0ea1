//! Content classification.
//!
//! Ordered, weighted pattern signals decide what the content is. The
//! inference engine is consulted only when the rule score is ambiguous,
//! and its opinion is blended in rather than trusted outright.
//!
//! Signal order: anti-patterns, login wall, expiration, platform,
//! structured data, content markers. The first anti-pattern forces
//! `non_job` and caps the job score; login and expiration signals force
//! their category outright.

pub mod patterns;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::engine::{EngineUsage, InferenceOrchestrator};
use crate::extract::structured;
use crate::types::classification::{Category, ClassificationResult, Platform, Signal, SignalKind};
use crate::types::config::{ClassifierConfig, InferenceStrategy};
use crate::types::content::RawContent;

use patterns::{PatternSignal, Target};

/// Rule-only evaluation of one piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    /// Every evaluated signal, in order.
    pub signals: Vec<Signal>,
    /// Clamped sum of matched positive weights, capped after an anti-pattern.
    pub job_score: f32,
    /// Category forced by the first matching anti-pattern, login or
    /// expiration signal, with that signal's weight as confidence.
    pub forced: Option<(Category, f32)>,
    pub platform: Platform,
}

/// Views of the content that patterns are matched against.
struct Haystacks<'a> {
    url: &'a str,
    path: String,
    text: &'a str,
    markup: &'a str,
}

impl Haystacks<'_> {
    fn matches(&self, signal: &PatternSignal) -> bool {
        signal.targets.iter().any(|target| {
            let haystack = match target {
                Target::Url => self.url,
                Target::Path => self.path.as_str(),
                Target::Text => self.text,
                Target::Markup => self.markup,
            };
            signal.pattern.is_match(haystack)
        })
    }
}

/// Classifies content as a job posting or one of the rejection categories.
pub struct ContentClassifier {
    config: ClassifierConfig,
    degraded_cap: f32,
    orchestrator: Option<Arc<InferenceOrchestrator>>,
}

impl ContentClassifier {
    pub fn new(config: ClassifierConfig, degraded_cap: f32) -> Self {
        Self {
            config,
            degraded_cap,
            orchestrator: None,
        }
    }

    /// Consult this orchestrator for ambiguous scores.
    pub fn with_orchestrator(mut self, orchestrator: Arc<InferenceOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn engine(&self) -> Option<&InferenceOrchestrator> {
        match self.config.strategy {
            InferenceStrategy::Hybrid => self.orchestrator.as_deref(),
            InferenceStrategy::RulesOnly => None,
        }
    }

    /// Evaluate the rule signals only.
    pub fn score_rules(&self, content: &RawContent, text: &str) -> RuleScore {
        let parsed = Url::parse(&content.url).ok();
        let hay = Haystacks {
            url: &content.url,
            path: parsed
                .as_ref()
                .map(|u| u.path().to_lowercase())
                .unwrap_or_default(),
            text,
            markup: &content.body,
        };

        let mut signals = Vec::new();
        let mut forced: Option<(Category, f32)> = None;
        let mut push = |signals: &mut Vec<Signal>, name: &str, kind: SignalKind, weight: f32, matched: bool| {
            if matched && forced.is_none() {
                forced = kind.forced_category().map(|c| (c, weight));
            }
            signals.push(Signal {
                name: name.to_string(),
                kind,
                weight,
                matched,
            });
        };

        // Anti-patterns
        push(
            &mut signals,
            "homepage_root",
            SignalKind::AntiPattern,
            0.9,
            parsed.as_ref().is_some_and(is_site_root),
        );
        for signal in patterns::ANTI_PATTERNS.iter() {
            push(&mut signals, signal.name, signal.kind, signal.weight, hay.matches(signal));
        }

        // Login wall
        for signal in patterns::LOGIN_PATTERNS.iter() {
            push(&mut signals, signal.name, signal.kind, signal.weight, hay.matches(signal));
        }

        // Expiration
        for signal in patterns::EXPIRATION_PATTERNS.iter() {
            push(&mut signals, signal.name, signal.kind, signal.weight, hay.matches(signal));
        }
        let posting = structured::find_job_posting(&content.body);
        push(
            &mut signals,
            "valid_through_passed",
            SignalKind::Expiration,
            0.9,
            posting
                .as_ref()
                .and_then(|p| p.valid_through)
                .is_some_and(|until| valid_through_passed(until, content.fetched_at)),
        );

        // Platform
        let mut platform_matched = false;
        for (_, signal) in patterns::PLATFORM_PATTERNS.iter() {
            let matched = hay.matches(signal);
            platform_matched |= matched;
            push(&mut signals, signal.name, signal.kind, signal.weight, matched);
        }
        let careers = &*patterns::CAREERS_PATH;
        push(
            &mut signals,
            careers.name,
            careers.kind,
            careers.weight,
            !platform_matched && hay.matches(careers),
        );

        // Structured data
        push(
            &mut signals,
            "jsonld_job_posting",
            SignalKind::Positive,
            0.4,
            posting.is_some() || patterns::JSON_LD_MARKER.is_match(&content.body),
        );
        let microdata = &*patterns::MICRODATA_MARKER;
        push(&mut signals, microdata.name, microdata.kind, microdata.weight, hay.matches(microdata));

        // Content markers
        for signal in patterns::CONTENT_MARKERS.iter() {
            push(&mut signals, signal.name, signal.kind, signal.weight, hay.matches(signal));
        }

        let positive: f32 = signals
            .iter()
            .filter(|s| s.matched && s.kind == SignalKind::Positive)
            .map(|s| s.weight)
            .sum();
        let mut job_score = positive.clamp(0.0, 1.0);
        if signals
            .iter()
            .any(|s| s.matched && s.kind == SignalKind::AntiPattern)
        {
            job_score = job_score.min(self.config.anti_pattern_ceiling);
        }

        RuleScore {
            signals,
            job_score,
            forced,
            platform: parsed
                .as_ref()
                .map(patterns::detect_platform)
                .unwrap_or(Platform::Other),
        }
    }

    /// Classify content, consulting the engine for ambiguous rule scores.
    ///
    /// Engine failures never surface here: the rule score is used, capped,
    /// and the result is marked degraded.
    pub async fn classify(
        &self,
        content: &RawContent,
        text: &str,
        usage: &mut EngineUsage,
    ) -> ClassificationResult {
        let rules = self.score_rules(content, text);
        let matched: Vec<&str> = rules
            .signals
            .iter()
            .filter(|s| s.matched)
            .map(|s| s.name.as_str())
            .collect();
        debug!(rule_score = rules.job_score, ?matched, "Rule signals evaluated");

        if let Some((category, confidence)) = rules.forced {
            info!(%category, confidence, "Category forced by signal");
            return ClassificationResult {
                category,
                confidence,
                job_score: rules.job_score,
                signals: rules.signals,
                platform: rules.platform,
                engine_consulted: false,
                degraded: false,
            };
        }

        let mut score = rules.job_score;
        let mut engine_consulted = false;
        let mut degraded = false;

        let ambiguous =
            score >= self.config.ambiguous_low && score < self.config.ambiguous_high;
        if let (true, Some(engine)) = (ambiguous, self.engine()) {
            engine_consulted = true;
            match engine.classify(text, usage).await {
                Ok(answer) => {
                    let support = if answer.category == Category::JobPosting {
                        answer.confidence
                    } else {
                        1.0 - answer.confidence
                    };
                    let w = self.config.inference_weight;
                    score = (score * (1.0 - w) + support * w).clamp(0.0, 1.0);
                    debug!(
                        engine_category = %answer.category,
                        engine_confidence = answer.confidence,
                        blended = score,
                        "Blended engine classification"
                    );
                }
                Err(error) => {
                    warn!(code = error.code(), "Engine classification failed, using rules only");
                    score = score.min(self.degraded_cap);
                    degraded = true;
                }
            }
        }

        let category = if score >= self.config.min_category_score {
            Category::JobPosting
        } else {
            Category::Ambiguous
        };
        info!(%category, confidence = score, degraded, "Content classified");

        ClassificationResult {
            category,
            confidence: score,
            job_score: score,
            signals: rules.signals,
            platform: rules.platform,
            engine_consulted,
            degraded,
        }
    }

    /// Whether extraction should run for this result.
    pub fn qualifies_for_extraction(&self, result: &ClassificationResult) -> bool {
        match result.category {
            Category::JobPosting => true,
            Category::Ambiguous => result.confidence >= self.config.ambiguous_recheck_score,
            _ => false,
        }
    }
}

/// Root of a site: empty path or `/`, optionally an index page, no query.
fn is_site_root(url: &Url) -> bool {
    let path = url.path().trim_end_matches('/').to_lowercase();
    let root = path.is_empty() || matches!(path.as_str(), "/index.html" | "/index.php" | "/home");
    root && url.query().map_or(true, |q| q.is_empty())
}

fn valid_through_passed(until: DateTime<Utc>, fetched_at: DateTime<Utc>) -> bool {
    until < fetched_at
}
