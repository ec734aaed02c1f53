//! Error types for the command-line front end.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors detected before any archive is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input path does not exist
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Input has no file stem to derive an output directory from
    #[error("Cannot derive an output directory from {}", .0.display())]
    NoOutputName(PathBuf),

    /// Extension filter is empty after normalization
    #[error("Extension filter must not be empty")]
    EmptyExtension,
}
