//! # submitter CLI entry point
//!
//! Parses command-line flags, loads the run configuration from the
//! environment, initializes tracing, and hands off to [`run_submit`].

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use submitter_cli::submit::run_submit;
use submitter_cli::EXIT_ERROR;
use submitter_sync::SubmitConfig;

/// Publish rendered envelopes and their assets to the content service.
///
/// All settings come from the environment: ENVELOPE_DIR, ASSET_DIR,
/// CONTENT_SERVICE_URL, CONTENT_SERVICE_APIKEY and CONTENT_ID_BASE are
/// required; ASSET_BATCH_SIZE, CONTENT_SERVICE_TIMEOUT_SECS and VERBOSE are
/// optional.
#[derive(Parser, Debug)]
#[command(name = "submitter", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging. Same effect as setting VERBOSE.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override ASSET_BATCH_SIZE (compressed bytes per asset upload batch).
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = SubmitConfig::from_env();

    let verbose = cli.verbose > 0 || config.as_ref().is_ok_and(|c| c.verbose);
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},reqwest=warn,hyper=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "submitter starting");

    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if let Some(batch_size) = cli.batch_size {
        config = config.with_batch_size(batch_size);
    }

    match run_submit(&config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
