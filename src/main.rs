//! eval-tracker binary entrypoint.
//! Fetches the configured evaluation pages, appends changed snapshots to the
//! history log and rebuilds the latest-value projection.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eval_tracker::config::{load_sources_default, load_sources_from, TrackerConfig};
use eval_tracker::ingest::fetcher::HttpFetcher;
use eval_tracker::metrics::Metrics;
use eval_tracker::{ExtractorRegistry, Pipeline, SnapshotLog, SourceOutcome, ValidatorCache};

#[derive(Parser, Debug)]
#[command(name = "eval-tracker", version, about = "Track AI evaluation metrics over time")]
struct Cli {
    /// Sources file (TOML or JSON); overrides TRACKER_SOURCES_PATH.
    #[arg(long, global = true)]
    sources: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every source, record changes, rebuild the projection (default).
    Run,
    /// Rebuild the latest projection from the existing log only.
    Rebuild,
}

/// Compact logs by default; `TRACKER_LOG_FORMAT=json` for JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eval_tracker=info,warn"));

    let json = std::env::var("TRACKER_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn pipeline(cfg: &TrackerConfig) -> Result<Pipeline> {
    let fetcher = HttpFetcher::new(&cfg.fetch)?;
    Ok(Pipeline::new(
        Arc::new(fetcher),
        ExtractorRegistry::builtin(),
        ValidatorCache::load(&cfg.cache_path),
        SnapshotLog::new(&cfg.log_path),
        &cfg.latest_path,
    ))
}

async fn run(cli: Cli, cfg: TrackerConfig) -> Result<()> {
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let sources_path = cli.sources.or_else(|| cfg.sources_path.clone());
            let sources = match sources_path {
                Some(p) => load_sources_from(&p)?,
                None => load_sources_default()?,
            };
            let mut p = pipeline(&cfg)?;
            let report = p.run(&sources).await.context("pipeline run")?;
            for r in &report.sources {
                println!("[run] {r}");
            }
            println!(
                "[run] rebuilt latest projection ({} entries)",
                report.projection_entries
            );
            tracing::info!(
                recorded = report.recorded(),
                sources = report.sources.len(),
                "run complete"
            );
            let lost = report
                .sources
                .iter()
                .filter(|r| matches!(r.outcome, SourceOutcome::AppendFailed(_)))
                .count();
            if lost > 0 {
                write_metrics(metrics.as_ref(), &cfg)?;
                bail!("{lost} snapshot(s) could not be appended to {}", cfg.log_path.display());
            }
        }
        Command::Rebuild => {
            let p = pipeline(&cfg)?;
            let n = p.rebuild_latest().context("rebuilding projection")?;
            println!("[rebuild] rebuilt latest projection ({n} entries)");
        }
    }

    write_metrics(metrics.as_ref(), &cfg)
}

fn write_metrics(metrics: Option<&Metrics>, cfg: &TrackerConfig) -> Result<()> {
    if let (Some(m), Some(path)) = (metrics, cfg.metrics_path.as_deref()) {
        m.write_textfile(path)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op if absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = TrackerConfig::from_env();

    match run(cli, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "run failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
