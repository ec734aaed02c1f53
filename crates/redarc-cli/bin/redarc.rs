//! redarc binary entry point.
//!
//! Parses arguments, initializes logging and runs the extractor. Exits with
//! a failure status when any archive could not be opened.

use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use redarc_cli::{DumpConfig, extract};
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let config = DumpConfig::from_args();

    // RUST_LOG wins over --log-level
    let level = Level::from(config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    tracing::info!(
        "Extracting {} to {}",
        config.input.display(),
        config.output_dir()?.display()
    );

    let mut stdout = std::io::stdout().lock();
    let summary = extract::run(&config, &mut stdout)?;
    stdout.flush()?;

    tracing::info!(
        "{} archives ({} failed), {} entries ({} failed), {} files written",
        summary.archives,
        summary.failed_archives,
        summary.entries,
        summary.failed_entries,
        summary.files_written
    );

    Ok(if summary.failed_archives > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
