//! Error types for the cardcheck library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cardcheck operations.
#[derive(Debug, Error)]
pub enum CardcheckError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A structurally required column is absent from the record store.
    #[error("Required column '{column}' is missing from the input")]
    MissingColumn { column: String },

    /// A record handed to the validator carries no identifier.
    #[error("Record at row {row} has no value for identifier column '{column}'")]
    MissingIdentifier { row: usize, column: String },

    /// Empty file or no records to scan.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Malformed row in an anomaly report being read back.
    #[error("Report error at row {row}: {message}")]
    Report { row: usize, message: String },

    /// The text-generation oracle could not be reached or returned an error.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for cardcheck operations.
pub type Result<T> = std::result::Result<T, CardcheckError>;
