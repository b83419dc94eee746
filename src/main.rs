// ==============================================================================
// main.rs - Summary Statistics Merger Entry Point
// ==============================================================================
// Description: Command-line entry point: load configuration, run the merge
//              pipeline, write the merged table
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sumstat_merger::config::Config;
use sumstat_merger::processor::MergeProcessor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration listing input datasets and heterogeneity tests
    #[arg(short, long, env = "SUMSTAT_MERGER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Path of the merged TSV table
    #[arg(short, long, env = "SUMSTAT_MERGER_OUTPUT", default_value = "mmp.tsv")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sumstat_merger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Summary statistics merger starting...");
    info!("Loading configuration from {}", args.config.display());

    let config = Config::load(&args.config)
        .with_context(|| format!("Invalid configuration {}", args.config.display()))?;

    let processor = MergeProcessor::new(config, args.output);
    let output = processor.process().await?;

    info!("Merge complete: {}", output.display());
    Ok(())
}
