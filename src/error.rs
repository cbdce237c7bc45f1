//! Error types for the arima-analyzer library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that can occur while loading, modelling or exporting a series.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Missing values detected when not allowed.
    #[error("missing values detected in data")]
    MissingValues,

    /// Unknown timeframe name.
    #[error("unsupported timeframe '{0}' (expected one of M1, M5, M15, H1, H4, D1)")]
    InvalidTimeframe(String),

    /// No data file exists for the requested symbol/timeframe.
    #[error("data file not found: {}", .0.display())]
    DataNotFound(PathBuf),

    /// Requested column is not present in the data file.
    #[error("column '{column}' not found (available: {})", .available.join(", "))]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    /// Computation error (e.g., numerical issues or no model could be fitted).
    #[error("computation error: {0}")]
    ComputationError(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Chart rendering failed.
    #[error("plotting failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
