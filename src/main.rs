//! CLI entry point for the mirror tool.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use mirror_core::download::{EXIT_FAILURE, EXIT_SUCCESS};
use mirror_core::{FetchEngine, FetchError, FetchReport};
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => return usage_exit(&e),
    };

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Standard output may carry the fetched body, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(report) => {
            if report.failed() > 0 {
                warn!(failed = report.failed(), "some assets could not be fetched");
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            error!("{e:#}");
            let code = e
                .downcast_ref::<FetchError>()
                .map_or(EXIT_FAILURE, FetchError::exit_code);
            ExitCode::from(code)
        }
    }
}

/// Prints a clap error or help text; usage errors share the general failure status.
fn usage_exit(error: &clap::Error) -> ExitCode {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::from(EXIT_SUCCESS),
        _ => ExitCode::from(EXIT_FAILURE),
    }
}

async fn run(args: &Args) -> Result<FetchReport> {
    let config = args.to_config();
    info!(url = %config.url, depth = config.max_depth, "Mirror starting");

    let engine =
        FetchEngine::new(config.concurrency).context("failed to create fetch engine")?;
    let report = engine.run(&config).await?;

    info!(
        fetched = report.fetched(),
        failed = report.failed(),
        discovered = report.discovered(),
        dispatched = report.dispatched(),
        "Mirror complete"
    );
    Ok(report)
}
