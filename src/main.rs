//! CLI entry point for the harvest tool.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use harvest_core::{
    HttpJsonSource, HttpTimeouts, JsonSource, OutputTable, PageFetcher, PipelineDriver,
    RecordTransformer, ResourceResolver, Termination, TransformRules,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, sources) = cli::parse_with_sources();
    let file_config = app_config::load_file_config(args.config.as_deref())?;
    let args = app_config::apply_config_defaults(args, &sources, file_config.as_ref());

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(app_config::resolve_default_log_level(&args))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!(start_url = %args.start_url, "Harvest starting");

    let driver = build_driver(&args)?;

    let interrupted = driver.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted.store(true, Ordering::SeqCst);
        }
    });

    let report = driver.run_with_report(&args.start_url).await;

    write_output(&args, &report.table)?;

    match report.termination {
        Termination::Completed => {
            info!(
                rows = report.table.len(),
                pages = report.pages_fetched,
                output = %args.output.display(),
                "Harvest complete"
            );
            Ok(ExitCode::SUCCESS)
        }
        Termination::Aborted { reason } => {
            warn!(rows = report.table.len(), %reason, "Partial table written");
            Ok(ExitCode::FAILURE)
        }
        Termination::Cancelled => {
            warn!(rows = report.table.len(), "Interrupted. Partial table written.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_driver(args: &Args) -> Result<PipelineDriver> {
    let timeouts = HttpTimeouts {
        connect_secs: args.connect_timeout,
        request_secs: args.timeout,
    };
    let source: Arc<dyn JsonSource> =
        Arc::new(HttpJsonSource::with_timeouts(timeouts).context("Failed to build HTTP client")?);
    let resolver = Arc::new(ResourceResolver::new(Arc::clone(&source)));
    let transformer = RecordTransformer::with_concurrency(
        resolver,
        TransformRules::people(),
        usize::from(args.concurrency),
    )?;

    Ok(PipelineDriver::new(PageFetcher::new(source), transformer))
}

fn write_output(args: &Args, table: &OutputTable) -> Result<()> {
    if args.writes_to_stdout() {
        let mut stdout = io::stdout().lock();
        table
            .write_csv(&mut stdout)
            .context("Failed to write CSV to stdout")?;
        stdout.flush()?;
        return Ok(());
    }

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create '{}'", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    table
        .write_csv(&mut writer)
        .with_context(|| format!("Failed to write '{}'", args.output.display()))?;
    writer.flush()?;
    Ok(())
}
