//! Error types for scanner report normalization.

use std::path::PathBuf;

/// Errors from reading and normalizing scanner reports.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The report is not JSON, or matches neither supported shape.
    #[error("malformed scanner report: {0}")]
    MalformedInput(String),

    /// The report file could not be read.
    #[error("failed to read scanner report `{}`: {source}", path.display())]
    ReadError {
        /// Path to the report.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
