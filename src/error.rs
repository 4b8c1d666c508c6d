//! Error types for Trueno-Pipeline
//!
//! Every failure carries enough context for the stage binary to print a
//! one-line diagnostic before exiting with status 1.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// Wrong positional argument count for a stage binary
    #[error("Arguments error. Usage: {0}")]
    Usage(String),

    /// Logical data path could not be resolved by the versioned repository
    #[error("Data resolution failed: {0}")]
    Resolution(String),

    /// Cached content does not match the digest recorded in its pointer file
    #[error("Integrity check failed for {path}: expected md5 {expected}, found {actual}")]
    Integrity {
        /// Logical path being resolved
        path: String,
        /// Digest recorded in the pointer file
        expected: String,
        /// Digest of the cached bytes
        actual: String,
    },

    /// Tabular content could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Dataset columns do not match what the stage expects
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Train/test split parameters cannot produce two non-empty subsets
    #[error("Split error: {0}")]
    Split(String),

    /// Model fitting, prediction or artifact decoding failed
    #[error("Model error: {0}")]
    Model(String),

    /// Tracking backend rejected or failed a request
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// A pipeline stage exited with a non-zero status
    #[error("Stage '{stage}' failed with exit code {code:?}")]
    StageFailed {
        /// Binary name of the failing stage
        stage: String,
        /// Exit code, `None` if terminated by a signal
        code: Option<i32>,
    },

    /// One or more validator checks failed
    #[error("Validation failed: {0} check(s) did not pass")]
    Validation(usize),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
