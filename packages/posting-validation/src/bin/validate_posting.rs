//! CLI for validating a single job posting.
//!
//! Reads the content from a file (or stdin), runs it through the pipeline
//! and prints the outcome and audit record as JSON on stdout. Logs go to
//! stderr.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use posting_validation::{
    ContentKind, DisabledEngine, FetchError, FieldOverrides, HttpInferenceEngine, InferenceEngine,
    JobField, JsonLinesSink, PipelineConfig, RawContent, RunSink, ValidationPipeline,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "validate-posting")]
#[command(about = "Validate and extract a job posting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over one piece of content
    Run {
        /// URL the content was fetched from
        #[arg(long)]
        url: String,

        /// File holding the body; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "html")]
        kind: Kind,

        /// HTTP status of the fetch
        #[arg(long, default_value_t = 200)]
        status: u16,

        /// Fetch failure reported by the crawler
        #[arg(long, value_enum)]
        fetch_error: Option<FetchFailure>,

        /// Inference engine endpoint (falls back to POSTING_VALIDATION_ENGINE_URL)
        #[arg(long)]
        engine_url: Option<String>,

        /// Never consult an inference engine
        #[arg(long)]
        rules_only: bool,

        /// Append the run to this JSON lines file
        #[arg(long)]
        record: Option<PathBuf>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Run only the quality gate over supplied field values
    Gate {
        #[command(flatten)]
        fields: FieldArgs,
    },
}

#[derive(Args)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    salary: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

impl FieldArgs {
    fn overrides(self) -> FieldOverrides {
        let pairs = [
            (JobField::Title, self.title),
            (JobField::Company, self.company),
            (JobField::Location, self.location),
            (JobField::Salary, self.salary),
            (JobField::Description, self.description),
        ];
        pairs
            .into_iter()
            .fold(FieldOverrides::new(), |acc, (field, value)| match value {
                Some(value) => acc.with(field, value),
                None => acc,
            })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Html,
    PdfText,
    Manual,
}

impl From<Kind> for ContentKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Html => ContentKind::Html,
            Kind::PdfText => ContentKind::PdfText,
            Kind::Manual => ContentKind::Manual,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FetchFailure {
    Timeout,
    Forbidden,
    Dns,
    Other,
}

impl From<FetchFailure> for FetchError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Timeout => FetchError::Timeout,
            FetchFailure::Forbidden => FetchError::Forbidden,
            FetchFailure::Dns => FetchError::Dns,
            FetchFailure::Other => FetchError::Other,
        }
    }
}

#[derive(Serialize)]
struct GateReport {
    verdict: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection_reason: Option<posting_validation::RejectionReason>,
    quality: posting_validation::QualityAssessment,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,posting_validation=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Invalid POSTING_VALIDATION_* settings")?;

    match cli.command {
        Commands::Run {
            url,
            file,
            kind,
            status,
            fetch_error,
            engine_url,
            rules_only,
            record,
            fields,
        } => {
            let body = read_body(file.as_ref())?;
            let mut content = RawContent::new(url, body, kind.into()).with_status(status);
            if let Some(failure) = fetch_error {
                content = content.with_fetch_error(failure.into());
            }

            let pipeline = build_pipeline(config, engine_url, rules_only)?;
            let overrides = fields.overrides();
            let overrides = (!overrides.is_empty()).then_some(overrides);

            let (outcome, audit) = pipeline.run(content, overrides).await;
            if let Some(path) = record {
                let sink = JsonLinesSink::new(&path);
                sink.record(&outcome, &audit)
                    .await
                    .with_context(|| format!("Failed to record run to {}", path.display()))?;
            }

            let output = serde_json::json!({ "outcome": outcome, "audit": audit });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Gate { fields } => {
            let pipeline = ValidationPipeline::rules_only(config)?;
            let values: BTreeMap<JobField, String> = fields.overrides().values;
            if values.is_empty() {
                bail!("Supply at least one field, e.g. --title");
            }
            let decision = pipeline.gate().evaluate_fields(&values);
            let (verdict, rejection_reason) = match decision.verdict {
                posting_validation::Verdict::Accept => ("accepted", None),
                posting_validation::Verdict::Warn => ("warned", None),
                posting_validation::Verdict::Reject(reason) => ("rejected", Some(reason)),
            };
            let report = GateReport {
                verdict: verdict.to_string(),
                rejection_reason,
                quality: decision.assessment,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn read_body(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read stdin")?;
            Ok(body)
        }
    }
}

fn build_pipeline(
    config: PipelineConfig,
    engine_url: Option<String>,
    rules_only: bool,
) -> Result<ValidationPipeline> {
    if rules_only {
        return Ok(ValidationPipeline::rules_only(config)?);
    }

    let engine: Arc<dyn InferenceEngine> = match engine_url {
        Some(url) => Arc::new(HttpInferenceEngine::new(url)),
        None => match HttpInferenceEngine::from_env() {
            Ok(engine) => Arc::new(engine),
            Err(_) => {
                tracing::warn!("No inference engine configured, running degraded");
                Arc::new(DisabledEngine)
            }
        },
    };
    Ok(ValidationPipeline::new(config, engine)?)
}
