//! Error types for stackscope-core
//!
//! Only the edges of an analysis run can fail: loading configuration and
//! writing the report. Everything on the reading side degrades into findings.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the stackscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Report could not be written to its destination
    #[error("failed to write report to {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for stackscope-core
pub type Result<T> = std::result::Result<T, Error>;
