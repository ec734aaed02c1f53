//! Command-line configuration.
//!
//! Options come from CLI arguments, with environment fallbacks for the
//! output directory (`REDARC_OUTPUT`), the batch extension filter
//! (`REDARC_EXTENSION`) and disabling memory mapping (`REDARC_NO_MMAP`).
//!
//! # Example
//!
//! ```no_run
//! use redarc_cli::DumpConfig;
//!
//! let config = DumpConfig::from_args();
//! config.validate().expect("Invalid configuration");
//! println!("Writing to {}", config.output_dir().expect("output").display());
//! ```

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use redarc_formats::SourceMode;
use tracing::Level;

use crate::error::ConfigError;

/// Output directory used for batch runs without an explicit one
pub const DEFAULT_BATCH_OUTPUT: &str = "dump";

/// Extractor configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "redarc",
    about = "Extract and inspect RDAR archives and their CR2W resources",
    version
)]
pub struct DumpConfig {
    /// Archive file, or directory of archives
    pub input: PathBuf,

    /// Output directory
    #[arg(env = "REDARC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Extension selecting archives in directory mode, with or without the dot
    #[arg(long, env = "REDARC_EXTENSION", default_value = "archive")]
    pub extension: String,

    /// Read archives into memory instead of mapping them
    #[arg(long, env = "REDARC_NO_MMAP")]
    pub no_mmap: bool,

    /// Print the name table of every resource
    #[arg(long)]
    pub names: bool,

    /// Print imports (entries with zero flags are skipped)
    #[arg(long)]
    pub imports: bool,

    /// Print the property table
    #[arg(long)]
    pub properties: bool,

    /// Print exports with their parent and children
    #[arg(long)]
    pub exports: bool,

    /// Print and write buffers
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub buffers: bool,

    /// Print embedded records
    #[arg(long)]
    pub embedded: bool,

    /// Enable every table dump
    #[arg(long)]
    pub all: bool,

    /// Print one summary line per entry
    #[arg(long)]
    pub list: bool,

    /// Decode and print only; write nothing
    #[arg(long)]
    pub no_write: bool,

    /// Logging level used when RUST_LOG is unset
    #[arg(short, long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Which tables are printed and whether files are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpOptions {
    pub names: bool,
    pub imports: bool,
    pub properties: bool,
    pub exports: bool,
    pub buffers: bool,
    pub embedded: bool,
    pub list: bool,
    pub write: bool,
}

impl DumpConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Check that the input exists and the filter is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.exists() {
            return Err(ConfigError::MissingInput(self.input.clone()));
        }
        if self.normalized_extension().is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        Ok(())
    }

    /// Whether the input is a directory of archives
    pub fn is_batch(&self) -> bool {
        self.input.is_dir()
    }

    /// Extension filter without a leading dot
    pub fn normalized_extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    pub const fn source_mode(&self) -> SourceMode {
        if self.no_mmap {
            SourceMode::Loaded
        } else {
            SourceMode::Mapped
        }
    }

    /// Directory receiving extracted files.
    ///
    /// A single archive defaults to its file stem. A directory defaults to
    /// `dump`, with everything placed under a folder named after the input
    /// directory.
    pub fn output_dir(&self) -> Result<PathBuf, ConfigError> {
        if self.is_batch() {
            let base = self
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BATCH_OUTPUT));
            Ok(base.join(stem(&self.input)?))
        } else {
            match &self.output {
                Some(output) => Ok(output.clone()),
                None => Ok(PathBuf::from(stem(&self.input)?)),
            }
        }
    }

    pub const fn dump_options(&self) -> DumpOptions {
        DumpOptions {
            names: self.names || self.all,
            imports: self.imports || self.all,
            properties: self.properties || self.all,
            exports: self.exports || self.all,
            buffers: self.buffers || self.all,
            embedded: self.embedded || self.all,
            list: self.list,
            write: !self.no_write,
        }
    }
}

fn stem(path: &Path) -> Result<&std::ffi::OsStr, ConfigError> {
    path.file_stem()
        .ok_or_else(|| ConfigError::NoOutputName(path.to_path_buf()))
}
