//! Revisor CLI
//!
//! The `revisor` command reviews manuscript sections with a language model.
//!
//! ## Commands
//!
//! - `models`: list the registered models and what they need
//! - `review`: run every evaluation the selected model declares

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use revisor_core::{ConfigValues, EvaluationOutcome, EvaluationRequest};
use revisor_runtime::config::KNOWN_CONFIG_VALUES;
use revisor_runtime::{BackendRegistry, ReviewError, ReviewReport, ReviewService, RuntimeConfig};

/// Exit status when the selected model is not registered.
const EXIT_INVALID_SELECTION: u8 = 2;

#[derive(Parser)]
#[command(name = "revisor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Review scientific article sections with a language model", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models
    Models,

    /// Review a text or a set of article sections
    Review(ReviewArgs),
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["text", "text_file", "section", "request"])
))]
struct ReviewArgs {
    /// Display name of the model (see `revisor models`)
    #[arg(short, long)]
    model: String,

    /// Context about the article
    #[arg(long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the article context from a file
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Review a single free-form text
    #[arg(long)]
    text: Option<String>,

    /// Review a single free-form text read from a file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Add a named section read from a file (repeatable), e.g. abstract=abstract.txt
    #[arg(long, value_name = "NAME=PATH", value_parser = parse_section)]
    section: Vec<(String, PathBuf)>,

    /// Load a whole request document (YAML or JSON)
    #[arg(long)]
    request: Option<PathBuf>,

    /// Runtime configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum tokens per model call
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature for theme evaluations and summaries
    #[arg(long)]
    temperature: Option<f32>,

    /// Nucleus sampling cutoff
    #[arg(long)]
    top_p: Option<f32>,

    /// Maximum model calls in flight within one evaluation
    #[arg(long)]
    concurrency: Option<usize>,

    /// Keep other evaluations when one fails
    #[arg(long)]
    isolate_failures: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

fn parse_section(raw: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing section name in '{}'", raw));
    }
    if path.trim().is_empty() {
        return Err(format!("missing path for section '{}'", name));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(ReviewError::InvalidSelection { name, available }) =
                err.downcast_ref::<ReviewError>()
            {
                eprintln!("Invalid model selected: '{}'", name);
                eprintln!("Available models: {}", available.join(", "));
                return ExitCode::from(EXIT_INVALID_SELECTION);
            }
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Models => {
            cmd_models(&BackendRegistry::with_defaults());
            Ok(())
        }
        Commands::Review(args) => cmd_review(args).await,
    }
}

fn cmd_models(registry: &BackendRegistry) {
    for (name, kind) in registry.iter() {
        println!("{}", name);
        println!("  backend:     {}", kind);
        println!("  description: {}", kind.description());
        println!("  evaluations: {}", kind.evaluation_titles().join(", "));
        println!("  requires:    {}", kind.required_config().join(", "));
    }
}

async fn cmd_review(args: ReviewArgs) -> Result<()> {
    let config = load_config(&args)?;
    let request = build_request(&args)?;
    debug!(
        model = %args.model,
        sections = request.sections.len(),
        "request assembled"
    );

    let service = ReviewService::new(config);
    let report = service.review(&args.model, request).await?;

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report.response)
                .context("Failed to serialize evaluations")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_report(&report),
    }

    Ok(())
}

fn load_config(args: &ReviewArgs) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config = config.with_values(ConfigValues::from_env(KNOWN_CONFIG_VALUES));

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }
        config = config.with_max_concurrency(concurrency);
    }
    if args.isolate_failures {
        config = config.with_isolate_failures(true);
    }

    Ok(config)
}

fn build_request(args: &ReviewArgs) -> Result<EvaluationRequest> {
    let mut request = if let Some(path) = &args.request {
        load_request(path)?
    } else if let Some(text) = &args.text {
        EvaluationRequest::single("", text.as_str())
    } else if let Some(path) = &args.text_file {
        EvaluationRequest::single("", read_text(path)?)
    } else {
        let mut sections = Vec::with_capacity(args.section.len());
        for (name, path) in &args.section {
            sections.push((name.clone(), read_text(path)?));
        }
        EvaluationRequest::new("", sections)
    };

    if let Some(context) = &args.context {
        request.context = context.clone();
    } else if let Some(path) = &args.context_file {
        request.context = read_text(path)?;
    }

    if let Some(max_tokens) = args.max_tokens {
        request.params.max_tokens = max_tokens;
    }
    if let Some(temperature) = args.temperature {
        request.params.temperature = temperature;
    }
    if let Some(top_p) = args.top_p {
        request.params.top_p = top_p;
    }

    request.validate().context("Invalid review request")?;
    Ok(request)
}

fn load_request(path: &Path) -> Result<EvaluationRequest> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let request = if is_json {
        EvaluationRequest::from_json_file(path)
    } else {
        EvaluationRequest::from_yaml_file(path)
    };
    request.with_context(|| format!("Failed to load request from {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_report(report: &ReviewReport) {
    println!("Model:     {} ({})", report.model, report.backend);
    println!("Reviewed:  {}", report.reviewed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "LLM calls: {} ({} prompt + {} completion tokens)",
        report.usage.llm_calls, report.usage.prompt_tokens, report.usage.completion_tokens
    );

    for (title, outcome) in report.response.evaluations.iter() {
        println!();
        println!("== {} ==", title);
        match outcome {
            EvaluationOutcome::PerSection(sections) => {
                for (section, text) in sections {
                    println!("[{}]", section);
                    println!("{}", text.trim());
                }
            }
            EvaluationOutcome::Whole(text) => println!("{}", text.trim()),
            EvaluationOutcome::Skipped { skipped } => println!("(skipped: {})", skipped),
            EvaluationOutcome::Failed { error } => println!("(failed: {})", error),
        }
    }
}
