//! Pipeline configuration.
//!
//! One explicit, validated structure with a named field for every threshold.
//! The numeric defaults are planning estimates and should be calibrated
//! against labelled data.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::types::candidate::JobField;

/// Prefix for every environment variable read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "POSTING_VALIDATION_";

/// Whether a component may consult the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStrategy {
    /// Rules first, engine for ambiguous scores and gaps.
    #[default]
    Hybrid,
    /// Deterministic rules only.
    RulesOnly,
}

impl FromStr for InferenceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "rules_only" | "rules" => Ok(Self::RulesOnly),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Timeout, retry and circuit breaker settings for engine calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-attempt timeout. Default: 8000.
    pub call_timeout_ms: u64,

    /// Ceiling for one call including retries and backoff. Default: 15000.
    pub overall_budget_ms: u64,

    /// Retries after a timeout. Default: 2.
    pub max_retries: u32,

    /// First backoff delay. Default: 500.
    pub backoff_base_ms: u64,

    /// Backoff multiplier. Default: 2.
    pub backoff_factor: u32,

    /// Consecutive failed attempts that open the breaker. Default: 5.
    pub failure_threshold: u32,

    /// How long the breaker stays open. Default: 60000.
    pub cooldown_ms: u64,

    /// Engine answers below this confidence are failures. Default: 0.5.
    pub confidence_floor: f32,

    /// Maximum characters of content sent to the engine. Default: 20000.
    pub max_content_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 8_000,
            overall_budget_ms: 15_000,
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_factor: 2,
            failure_threshold: 5,
            cooldown_ms: 60_000,
            confidence_floor: 0.5,
            max_content_chars: 20_000,
        }
    }
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn overall_budget(&self) -> Duration {
        Duration::from_millis(self.overall_budget_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = u64::from(self.backoff_factor).saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_ms = ms;
        self
    }

    pub fn with_call_timeout_ms(mut self, ms: u64) -> Self {
        self.call_timeout_ms = ms;
        self
    }
}

/// Content classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub strategy: InferenceStrategy,

    /// Lower bound of the band where the engine is consulted. Default: 0.3.
    pub ambiguous_low: f32,

    /// Upper bound (exclusive) of that band. Default: 0.7.
    pub ambiguous_high: f32,

    /// Weight of the engine in the blended score. Default: 0.3.
    pub inference_weight: f32,

    /// Minimum score for the job-posting category. Default: 0.3.
    pub min_category_score: f32,

    /// Job score ceiling once an anti-pattern fires. Default: 0.2.
    pub anti_pattern_ceiling: f32,

    /// Ambiguous results at or above this still go to extraction. Default: 0.25.
    pub ambiguous_recheck_score: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: InferenceStrategy::Hybrid,
            ambiguous_low: 0.3,
            ambiguous_high: 0.7,
            inference_weight: 0.3,
            min_category_score: 0.3,
            anti_pattern_ceiling: 0.2,
            ambiguous_recheck_score: 0.25,
        }
    }
}

/// Structural extractor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub strategy: InferenceStrategy,

    /// Rule candidates below this are re-asked from the engine. Default: 0.7.
    pub rule_confidence_floor: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            strategy: InferenceStrategy::Hybrid,
            rule_confidence_floor: 0.7,
        }
    }
}

/// Quality gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Fields counted by completeness. Default: title, company, description.
    pub required_fields: Vec<JobField>,

    pub completeness_weight: f32,
    pub authenticity_weight: f32,
    pub consistency_weight: f32,

    /// Below this the outcome is rejected. Default: 0.7.
    pub reject_threshold: f32,

    /// Below this the outcome is warned; at or above, accepted. Default: 0.85.
    pub warn_threshold: f32,

    pub min_title_chars: usize,
    pub min_description_chars: usize,
    pub min_description_words: usize,

    /// Selected values below this confidence get a low-severity issue. Default: 0.5.
    pub low_field_confidence: f32,

    /// Field agreement below this is reported as a disagreement. Default: 0.5.
    pub disagreement_threshold: f32,

    /// Additional forbidden values on top of the built-in placeholder list.
    #[serde(default)]
    pub extra_forbidden_values: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            required_fields: vec![JobField::Title, JobField::Company, JobField::Description],
            completeness_weight: 0.3,
            authenticity_weight: 0.4,
            consistency_weight: 0.3,
            reject_threshold: 0.7,
            warn_threshold: 0.85,
            min_title_chars: 5,
            min_description_chars: 100,
            min_description_words: 20,
            low_field_confidence: 0.5,
            disagreement_threshold: 0.5,
            extra_forbidden_values: vec![],
        }
    }
}

impl QualityConfig {
    /// Add forbidden values.
    pub fn with_forbidden(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_forbidden_values
            .extend(values.into_iter().map(|v| v.into()));
        self
    }

    pub fn with_required_fields(mut self, fields: impl IntoIterator<Item = JobField>) -> Self {
        self.required_fields = fields.into_iter().collect();
        self
    }
}

/// Configuration for the whole validation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub engine: EngineConfig,
    pub classifier: ClassifierConfig,
    pub extractor: ExtractorConfig,
    pub quality: QualityConfig,

    /// Confidence ceiling for rule-only results after an engine failure.
    ///
    /// Default: 0.8.
    #[serde(default = "default_degraded_cap")]
    pub degraded_confidence_cap: f32,
}

fn default_degraded_cap() -> f32 {
    0.8
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            classifier: ClassifierConfig::default(),
            extractor: ExtractorConfig::default(),
            quality: QualityConfig::default(),
            degraded_confidence_cap: default_degraded_cap(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules only: the engine is never consulted.
    pub fn rules_only() -> Self {
        let mut config = Self::new();
        config.classifier.strategy = InferenceStrategy::RulesOnly;
        config.extractor.strategy = InferenceStrategy::RulesOnly;
        config
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_quality(mut self, quality: QualityConfig) -> Self {
        self.quality = quality;
        self
    }

    /// Load overrides from `POSTING_VALIDATION_*` environment variables.
    ///
    /// Unset variables keep their defaults. Call `dotenvy::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::new();

        let e = &mut config.engine;
        read_env("ENGINE_CALL_TIMEOUT_MS", &mut e.call_timeout_ms)?;
        read_env("ENGINE_OVERALL_BUDGET_MS", &mut e.overall_budget_ms)?;
        read_env("ENGINE_MAX_RETRIES", &mut e.max_retries)?;
        read_env("ENGINE_BACKOFF_BASE_MS", &mut e.backoff_base_ms)?;
        read_env("ENGINE_BACKOFF_FACTOR", &mut e.backoff_factor)?;
        read_env("ENGINE_FAILURE_THRESHOLD", &mut e.failure_threshold)?;
        read_env("ENGINE_COOLDOWN_MS", &mut e.cooldown_ms)?;
        read_env("ENGINE_CONFIDENCE_FLOOR", &mut e.confidence_floor)?;
        read_env("ENGINE_MAX_CONTENT_CHARS", &mut e.max_content_chars)?;

        let c = &mut config.classifier;
        read_env("CLASSIFIER_STRATEGY", &mut c.strategy)?;
        read_env("AMBIGUOUS_LOW", &mut c.ambiguous_low)?;
        read_env("AMBIGUOUS_HIGH", &mut c.ambiguous_high)?;
        read_env("INFERENCE_WEIGHT", &mut c.inference_weight)?;
        read_env("MIN_CATEGORY_SCORE", &mut c.min_category_score)?;
        read_env("ANTI_PATTERN_CEILING", &mut c.anti_pattern_ceiling)?;
        read_env("AMBIGUOUS_RECHECK_SCORE", &mut c.ambiguous_recheck_score)?;

        read_env("EXTRACTOR_STRATEGY", &mut config.extractor.strategy)?;
        read_env(
            "RULE_CONFIDENCE_FLOOR",
            &mut config.extractor.rule_confidence_floor,
        )?;

        let q = &mut config.quality;
        read_env("REJECT_THRESHOLD", &mut q.reject_threshold)?;
        read_env("WARN_THRESHOLD", &mut q.warn_threshold)?;
        read_env("MIN_TITLE_CHARS", &mut q.min_title_chars)?;
        read_env("MIN_DESCRIPTION_CHARS", &mut q.min_description_chars)?;
        read_env("MIN_DESCRIPTION_WORDS", &mut q.min_description_words)?;
        if let Ok(raw) = env::var(format!("{ENV_PREFIX}REQUIRED_FIELDS")) {
            q.required_fields = raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|name| {
                    JobField::parse(name).ok_or_else(|| ConfigError::InvalidEnv {
                        var: format!("{ENV_PREFIX}REQUIRED_FIELDS"),
                        value: raw.clone(),
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;
        }
        if let Ok(raw) = env::var(format!("{ENV_PREFIX}FORBIDDEN_VALUES")) {
            q.extra_forbidden_values = raw
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        read_env(
            "DEGRADED_CONFIDENCE_CAP",
            &mut config.degraded_confidence_cap,
        )?;

        config.validate()?;
        Ok(config)
    }

    /// Check ranges and threshold ordering.
    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.classifier;
        let q = &self.quality;
        let e = &self.engine;

        for (field, value) in [
            ("engine.confidence_floor", e.confidence_floor),
            ("classifier.ambiguous_low", c.ambiguous_low),
            ("classifier.ambiguous_high", c.ambiguous_high),
            ("classifier.inference_weight", c.inference_weight),
            ("classifier.min_category_score", c.min_category_score),
            ("classifier.anti_pattern_ceiling", c.anti_pattern_ceiling),
            ("classifier.ambiguous_recheck_score", c.ambiguous_recheck_score),
            ("extractor.rule_confidence_floor", self.extractor.rule_confidence_floor),
            ("quality.reject_threshold", q.reject_threshold),
            ("quality.warn_threshold", q.warn_threshold),
            ("quality.low_field_confidence", q.low_field_confidence),
            ("quality.disagreement_threshold", q.disagreement_threshold),
            ("quality.completeness_weight", q.completeness_weight),
            ("quality.authenticity_weight", q.authenticity_weight),
            ("quality.consistency_weight", q.consistency_weight),
            ("degraded_confidence_cap", self.degraded_confidence_cap),
        ] {
            unit_range(field, value)?;
        }

        ordered(
            ("classifier.ambiguous_low", c.ambiguous_low),
            ("classifier.ambiguous_high", c.ambiguous_high),
        )?;
        ordered(
            ("classifier.anti_pattern_ceiling", c.anti_pattern_ceiling),
            ("classifier.min_category_score", c.min_category_score),
        )?;
        ordered(
            ("classifier.ambiguous_recheck_score", c.ambiguous_recheck_score),
            ("classifier.min_category_score", c.min_category_score),
        )?;
        ordered(
            ("quality.reject_threshold", q.reject_threshold),
            ("quality.warn_threshold", q.warn_threshold),
        )?;

        let sum = q.completeness_weight + q.authenticity_weight + q.consistency_weight;
        if (f64::from(sum) - 1.0).abs() > 1e-3 {
            return Err(ConfigError::WeightSum {
                sum: f64::from(sum),
            });
        }

        if q.required_fields.is_empty() {
            return Err(ConfigError::Empty {
                field: "quality.required_fields",
            });
        }
        if e.failure_threshold == 0 {
            return Err(ConfigError::OutOfRange {
                field: "engine.failure_threshold",
                value: 0.0,
                min: 1.0,
                max: f64::from(u32::MAX),
            });
        }
        if e.call_timeout_ms == 0 || e.overall_budget_ms < e.call_timeout_ms {
            return Err(ConfigError::Ordering {
                lower: "engine.call_timeout_ms",
                lower_value: e.call_timeout_ms as f64,
                upper: "engine.overall_budget_ms",
                upper_value: e.overall_budget_ms as f64,
            });
        }

        Ok(())
    }
}

fn unit_range(field: &'static str, value: f32) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: f64::from(value),
            min: 0.0,
            max: 1.0,
        })
    }
}

fn ordered(lower: (&'static str, f32), upper: (&'static str, f32)) -> ConfigResult<()> {
    if lower.1 <= upper.1 {
        Ok(())
    } else {
        Err(ConfigError::Ordering {
            lower: lower.0,
            lower_value: f64::from(lower.1),
            upper: upper.0,
            upper_value: f64::from(upper.1),
        })
    }
}

fn read_env<T: FromStr>(suffix: &str, target: &mut T) -> ConfigResult<()> {
    let var = format!("{ENV_PREFIX}{suffix}");
    match env::var(&var) {
        Ok(raw) => {
            *target = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { var, value: raw })?;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}
