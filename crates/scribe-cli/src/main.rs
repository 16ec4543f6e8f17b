//! scribe: command-line driver for the reposcribe pipeline.
//!
//! Analyzes repositories from local checkouts with an Ollama model as the
//! summarization oracle. State is kept in memory and optionally persisted to
//! a JSON file between runs, so `pending` can pick up unfinished work.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scribe_core::{GenerationBackend, JobStatus};
use scribe_db::MemoryStore;
use scribe_inference::{OllamaBackend, OllamaConfig};
use scribe_jobs::{
    BatchConfig, BatchCoordinator, IngestConfig, LocalCheckoutIngestor, Pipeline,
    PipelineBuilder, PipelineConfig, PipelineMode, ProcessType,
};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(author, version, about = "Summarize repositories and generate their documents")]
#[command(propagate_version = true)]
struct Cli {
    /// JSON state file loaded before and saved after the command
    #[arg(long, global = true, env = "SCRIBE_STATE_FILE")]
    state: Option<PathBuf>,

    /// Directory holding checkouts as <owner>/<repo>
    #[arg(long, global = true, env = "SCRIBE_CHECKOUT_ROOT", default_value = "./checkouts")]
    checkout_root: PathBuf,

    /// Override the generation model
    #[arg(long, global = true, env = "OLLAMA_GEN_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single repository
    Analyze {
        /// Repository URL (https://github.com/owner/repo or owner/repo)
        url: String,

        /// Only redo stages whose artifacts are missing
        #[arg(long)]
        comprehensive: bool,
    },

    /// Process many repositories in concurrency windows
    Batch {
        /// Repository URLs
        urls: Vec<String>,

        /// File with one repository URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Repositories processed concurrently
        #[arg(short, long, env = "SCRIBE_BATCH_WINDOW")]
        window: Option<usize>,
    },

    /// Process known repositories that still need work
    Pending {
        /// Maximum repositories to pick up
        #[arg(short, long, env = "SCRIBE_PENDING_LIMIT")]
        limit: Option<usize>,

        /// analysis_only, docs_only, or analysis_and_docs
        #[arg(short, long, default_value = "analysis_and_docs")]
        process_type: ProcessType,

        /// Repositories processed concurrently
        #[arg(short, long, env = "SCRIBE_BATCH_WINDOW")]
        window: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "scribe=info,scribe_jobs=info")
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scribe=info,scribe_jobs=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("scribe.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Logs go to stderr; stdout carries command output.
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = match &cli.state {
        Some(path) => MemoryStore::load(path)
            .await
            .with_context(|| format!("loading state from {}", path.display()))?,
        None => MemoryStore::new(),
    };

    let mut ollama_config = OllamaConfig::from_env();
    if let Some(model) = &cli.model {
        ollama_config = ollama_config.with_gen_model(model.clone());
    }
    let backend = OllamaBackend::new(ollama_config).context("creating generation backend")?;
    match backend.health_check().await {
        Ok(true) => info!(model = backend.model_name(), "Generation backend ready"),
        _ => warn!(
            base_url = backend.base_url(),
            "Generation backend is not responding; oracle calls will fail"
        ),
    }

    let ingestor = LocalCheckoutIngestor::new(IngestConfig::from_env(&cli.checkout_root));
    let pipeline = PipelineBuilder::new(
        Arc::new(store.clone()),
        Arc::new(backend),
        Arc::new(ingestor),
    )
    .config(PipelineConfig::from_env())
    .build();

    let outcome = execute(cli.command, pipeline).await;

    if let Some(path) = &cli.state {
        store
            .save(path)
            .await
            .with_context(|| format!("saving state to {}", path.display()))?;
    }
    outcome
}

async fn execute(command: Commands, pipeline: Pipeline) -> anyhow::Result<()> {
    match command {
        Commands::Analyze { url, comprehensive } => {
            let mode = if comprehensive {
                PipelineMode::Comprehensive
            } else {
                PipelineMode::Full
            };
            let job_id = uuid::Uuid::new_v4().to_string();
            let handle = pipeline.spawn(job_id.clone(), url, mode);
            let status = handle.join().await;
            let response = pipeline.registry().status(&job_id);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if status != JobStatus::Success {
                bail!(
                    "job {} failed: {}",
                    job_id,
                    response.error.unwrap_or_default()
                );
            }
        }
        Commands::Batch { urls, file, window } => {
            let mut urls = urls;
            if let Some(path) = file {
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                urls.extend(
                    contents
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .map(str::to_string),
                );
            }
            if urls.is_empty() {
                bail!("no repository URLs given");
            }
            let mut config = BatchConfig::from_env();
            if let Some(window) = window {
                config = config.with_window(window);
            }
            let coordinator = BatchCoordinator::new(pipeline, config);
            let report = coordinator.run_batch_default(&urls).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Pending {
            limit,
            process_type,
            window,
        } => {
            let mut config = BatchConfig::from_env();
            if let Some(window) = window {
                config = config.with_window(window);
            }
            if let Some(limit) = limit {
                config = config.with_pending_limit(limit);
            }
            let coordinator = BatchCoordinator::new(pipeline, config);
            let report = coordinator.run_pending_default(process_type).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
