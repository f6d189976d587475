//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`IngestionService`] (from [`service`]) which:
//!
//! - parses the upload with a [`CsvRecordParser`]
//! - aggregates the surviving rows and persists them as one dataset
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! The parser is also usable on its own via [`self::csv::parse_equipment_csv`].

pub mod csv;
pub mod observability;
pub mod service;

pub use self::csv::{CsvRecordParser, ParsedRecords};
pub use observability::{
    severity_for_error, CompositeObserver, FileObserver, IngestionContext, IngestionObserver,
    IngestionSeverity, IngestionStats, LogObserver,
};
pub use service::{IngestOutcome, IngestionService};
