//! Error types shared across the ingestion, storage and reporting layers.
//!
//! Each component has its own enum; [`IngestError`] and [`ReportError`] wrap the lower layers
//! they orchestrate.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SkippedRow;

/// Result type for CSV parsing.
pub type ParseResult<T> = Result<T, ParseError>;
/// Result type for [`crate::store::DatasetStore`] operations.
pub type StoreResult<T> = Result<T, StoreError>;
/// Result type for report generation.
pub type ReportResult<T> = Result<T, ReportError>;
/// Result type for end-to-end ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Upload-level parse failure. Row-level problems are collected as [`SkippedRow`]s instead.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The header row lacks one or more required columns.
    #[error("missing required columns {missing:?} (headers={headers:?})")]
    MissingColumns {
        missing: Vec<String>,
        headers: Vec<String>,
    },

    /// No valid rows remained after skipping malformed ones.
    #[error("dataset is empty: no valid rows ({} skipped)", .skipped.len())]
    EmptyDataset { skipped: Vec<SkippedRow> },

    /// The input is not readable as CSV at all (e.g. the header is not UTF-8).
    #[error("malformed csv: {0}")]
    Malformed(#[from] csv::Error),
}

/// Failure of a [`crate::store::DatasetStore`] operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No dataset exists under the requested id.
    #[error("dataset '{id}' not found")]
    NotFound { id: String },

    /// The dataset could not be persisted. Nothing was published.
    #[error("failed to persist dataset at {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted state exists but could not be read back.
    #[error("failed to read dataset from {path}: {message}")]
    ReadFailure { path: PathBuf, message: String },

    /// The operation did not finish before its deadline.
    #[error("store operation '{operation}' timed out after {elapsed_ms} ms")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
    },
}

/// Failure while producing a summary or PDF report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// No dataset exists under the requested id.
    #[error("dataset '{id}' not found")]
    NotFound { id: String },

    /// Rendering did not finish before its deadline.
    #[error("report rendering timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// Any other storage failure while loading the dataset.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The render job terminated without producing a document.
    #[error("report rendering failed: {message}")]
    Render { message: String },
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ReportError::NotFound { id },
            StoreError::Timeout { elapsed_ms, .. } => ReportError::Timeout { elapsed_ms },
            other => ReportError::Store(other),
        }
    }
}

/// Failure of [`crate::ingestion::IngestionService::ingest`]. Either way, nothing was stored.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Failure loading or validating [`crate::config::AnalyticsConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

/// Credential verification failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity provider unavailable: {message}")]
    ProviderUnavailable { message: String },
}
