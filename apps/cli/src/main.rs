mod request;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use verbatim_core::{
    AlignmentConfig, AlignmentEngine, LlmAssistedSearch, NORMALIZATION_VERSION, Provider,
    ScriptResult, ScriptStatus, TranscriptContext, format_blocks_with_timestamps,
    format_script_readable,
};

use crate::request::{
    AlignmentRequest, AlignmentResponse, BlockView, BlocksResponse, TranscriptFile, read_json,
};

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "verbatim")]
#[command(about = "Re-anchor generated script quotes to word-level transcript identifiers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Segment a transcript into speaker-bounded blocks
    Blocks {
        /// Transcript JSON: a word array or an object with a `words` field
        transcript: PathBuf,

        /// Config file (defaults to the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a timestamped listing instead of JSON
        #[arg(short, long)]
        readable: bool,
    },

    /// Align every script of a request to the transcript
    Align {
        /// Request JSON with `words` and `scripts`
        request: PathBuf,

        /// Config file (defaults to the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// AI provider for assisted search
        #[arg(short, long, default_value = "grok")]
        provider: CliProvider,

        /// Deterministic matching only
        #[arg(long)]
        no_fallback: bool,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a human-readable report to stderr
        #[arg(short, long)]
        summary: bool,
    },
}

fn create_spinner(msg: &str) -> Result<ProgressBar> {
    if !Term::stderr().is_term() {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn load_config(path: Option<&PathBuf>) -> Result<AlignmentConfig> {
    let config = match path {
        Some(path) => AlignmentConfig::load(path)?,
        None => AlignmentConfig::load_or_default()?,
    };
    Ok(config)
}

fn status_style(status: ScriptStatus) -> console::StyledObject<&'static str> {
    match status {
        ScriptStatus::Success => style("✓").green().bold(),
        ScriptStatus::Partial => style("~").yellow().bold(),
        ScriptStatus::Failed => style("✗").red().bold(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verbatim=info,verbatim_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Blocks {
            transcript,
            config,
            readable,
        } => run_blocks(transcript, config, readable).await,
        Command::Align {
            request,
            config,
            provider,
            no_fallback,
            output,
            summary,
        } => {
            let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
            let span = info_span!("request", request_id = %request_id);
            run_align(
                request_id,
                request,
                config,
                provider.into(),
                no_fallback,
                output,
                summary,
            )
            .instrument(span)
            .await
        }
    }
}

async fn run_blocks(transcript: PathBuf, config: Option<PathBuf>, readable: bool) -> Result<()> {
    let config = load_config(config.as_ref())?;
    let words = read_json::<TranscriptFile>(&transcript).await?.into_words();
    let ctx = TranscriptContext::ingest(&words, &config)?;

    if readable {
        println!("{}", format_blocks_with_timestamps(ctx.blocks()));
        return Ok(());
    }

    let blocks = ctx
        .blocks()
        .iter()
        .map(|block| BlockView::new(block, &ctx))
        .collect::<Result<Vec<_>>>()?;
    let response = BlocksResponse {
        normalization_version: NORMALIZATION_VERSION,
        blocks,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_align(
    request_id: String,
    request_path: PathBuf,
    config: Option<PathBuf>,
    provider: Provider,
    no_fallback: bool,
    output: Option<PathBuf>,
    summary: bool,
) -> Result<()> {
    let mut config = load_config(config.as_ref())?;
    if no_fallback {
        config.fallback.enabled = false;
    }
    let fallback_enabled = config.fallback.enabled;

    let request: AlignmentRequest = read_json(&request_path).await?;
    info!(
        words = request.words.len(),
        scripts = request.scripts.len(),
        "Request loaded"
    );

    let mut engine = AlignmentEngine::new(&request.words, config)?;
    if fallback_enabled {
        match LlmAssistedSearch::new(provider) {
            Ok(search) => engine = engine.with_search(Arc::new(search)),
            Err(e) => warn!(error = %e, "Assisted search unavailable, continuing without fallback"),
        }
    }

    let spinner = create_spinner(&format!(
        "Aligning {} scripts ({})...",
        request.scripts.len(),
        provider.name()
    ))?;
    let results = engine.align_all(&request.scripts).await?;
    spinner.finish_and_clear();

    let response = AlignmentResponse {
        request_id,
        status: "ok",
        normalization_version: NORMALIZATION_VERSION,
        results,
    };
    let json = serde_json::to_string_pretty(&response)?;
    match &output {
        Some(path) => {
            fs::write(path, &json).await?;
            eprintln!(
                "\n{} {}\n",
                style("Saved:").dim(),
                style(path.display()).cyan()
            );
        }
        None => println!("{}", json),
    }

    if summary {
        print_summary(&response.results);
    }
    Ok(())
}

fn print_summary(results: &[ScriptResult]) {
    eprintln!(
        "\n{}  {}\n",
        style("verbatim").cyan().bold(),
        style("Alignment report").dim()
    );
    for result in results {
        eprintln!(
            "{} {} {}",
            status_style(result.status),
            result.concept_id,
            style(format!(
                "({} chunks, {} failures, {:.2}s)",
                result.script_chunks.len(),
                result.failures.len(),
                result.duration_seconds
            ))
            .dim()
        );
    }
    eprintln!("{}", style("─".repeat(60)).dim());
    for result in results {
        eprintln!("{}", format_script_readable(result));
    }
}
