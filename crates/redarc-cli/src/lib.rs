//! Command-line extractor for RDAR archives.
//!
//! The library half of the `redarc` binary:
//! - `config`: argument and environment parsing
//! - `extract`: archive discovery, entry and buffer extraction
//! - `dump`: text rendering of entries and resource tables
//!
//! # Example
//!
//! ```no_run
//! use redarc_cli::{DumpConfig, extract};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DumpConfig::from_args();
//!     config.validate()?;
//!     let summary = extract::run(&config, &mut std::io::stdout().lock())?;
//!     println!("{} entries", summary.entries);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dump;
pub mod error;
pub mod extract;

pub use config::{DumpConfig, DumpOptions, LogLevel};
pub use error::ConfigError;
pub use extract::Summary;
