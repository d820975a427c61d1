//! tunebatch-dl - Batch media downloader
//!
//! Reads a URL list file (one watch URL per line, `#` comments ignored),
//! drives the acquisition pipeline, and prints the final report. All the
//! real work lives in the library; this binary is bootstrapping only.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tunebatch_dl::{BatchOrchestrator, ConfigOverrides, PipelineConfig, PipelineEvent};

#[derive(Debug, Parser)]
#[command(name = "tunebatch-dl", version, about = "Batch media downloader and tagger")]
struct Cli {
    /// File containing one source URL per line
    url_file: PathBuf,

    /// Directory for intermediate downloads
    #[arg(long, env = "TUNEBATCH_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Directory the finished archive is written to
    #[arg(long, env = "TUNEBATCH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Concurrently dispatched requests per batch
    #[arg(long, env = "TUNEBATCH_BATCH_WIDTH")]
    batch_width: Option<usize>,

    /// Keep intermediate files after the run
    #[arg(long)]
    keep_temp: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting tunebatch-dl");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let urls = read_url_list(&cli.url_file)?;
    info!(count = urls.len(), file = %cli.url_file.display(), "Loaded URL list");

    let config = PipelineConfig::resolve(ConfigOverrides {
        temp_dir: cli.temp_dir,
        output_dir: cli.output_dir,
        batch_width: cli.batch_width,
    })?;
    info!(temp_dir = %config.temp_dir.display(), output_dir = %config.output_dir.display(), "Configuration resolved");

    let orchestrator = BatchOrchestrator::with_defaults(config)?;

    // Mirror progress events onto the log; the pipeline does not care
    // whether anyone listens
    let mut subscription = orchestrator.subscribe();
    let progress_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match event {
                PipelineEvent::ValidationProgress {
                    current,
                    total,
                    status,
                    ..
                }
                | PipelineEvent::AcquisitionProgress {
                    current,
                    total,
                    status,
                    ..
                } => info!("[{}/{}] {}", current, total, status),
                PipelineEvent::BatchCompleted {
                    successful, failed, ..
                } => info!("Batch complete: {} succeeded, {} failed", successful, failed),
            }
        }
    });

    let validated = orchestrator.validate_batch(&urls).await;
    let report = orchestrator.run_batch(validated).await;

    if !cli.keep_temp {
        orchestrator.cleanup().await?;
    }
    drop(orchestrator);
    let _ = progress_task.await;

    println!();
    println!(
        "Downloaded {} of {} items ({} failed)",
        report.successful,
        report.successful + report.failed,
        report.failed
    );
    for failure in &report.failures {
        println!("  FAILED  {}  ({})", failure.url, failure.error);
    }
    for warning in &report.warnings {
        println!("  WARNING {}", warning);
    }
    match &report.archive_path {
        Some(path) => println!("Archive: {}", path.display()),
        None if report.successful > 0 => println!("Archive: packaging failed, files left in temp"),
        None => println!("Archive: none (no successful downloads)"),
    }

    if report.successful == 0 && report.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Read the URL list: non-empty lines, `#` comments ignored
fn read_url_list(path: &PathBuf) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        bail!("URL list {} contains no URLs", path.display());
    }

    Ok(urls)
}
