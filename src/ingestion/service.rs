//! End-to-end ingestion: parse, aggregate, persist.
//!
//! [`IngestionService::ingest`] either stores the whole upload under a fresh id or stores
//! nothing:
//!
//! - parse failures ([`crate::ParseError`]) are returned before the store is touched
//! - persistence runs on the [`ExecutionEngine`] under the store timeout; a save that misses its
//!   deadline publishes nothing and surfaces as [`crate::StoreError::Timeout`], while a save
//!   that committed in time is reported as stored even if it finishes late
//!
//! If an [`IngestionObserver`] is configured, the service reports:
//!
//! - `on_success` with the stored row and skipped row counts
//! - `on_failure` on failure, with a computed severity
//! - `on_alert` on failure when the computed severity is >= `alert_at_or_above`

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{IngestResult, StoreError};
use crate::execution::{ExecutionEngine, JobError, JobKind};
use crate::store::DatasetStore;
use crate::types::{DatasetDraft, DatasetId, SkippedRow};

use super::csv::CsvRecordParser;
use super::observability::{
    severity_for_error, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
};

/// Default upper bound on a single store save.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub id: DatasetId,
    /// Rows left out of the stored dataset, in input order.
    pub skipped: Vec<SkippedRow>,
}

/// Turns uploaded CSV bytes into stored datasets.
pub struct IngestionService {
    parser: CsvRecordParser,
    store: Arc<dyn DatasetStore>,
    engine: Arc<ExecutionEngine>,
    store_timeout: Duration,
    observer: Option<Arc<dyn IngestionObserver>>,
    alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionService")
            .field("parser", &self.parser)
            .field("store_timeout", &self.store_timeout)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl IngestionService {
    pub fn new(store: Arc<dyn DatasetStore>, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            parser: CsvRecordParser::default(),
            store,
            engine,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }

    pub fn with_parser(mut self, parser: CsvRecordParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Attach an observer; failures at or above `alert_at_or_above` also raise `on_alert`.
    pub fn with_observer(
        mut self,
        observer: Arc<dyn IngestionObserver>,
        alert_at_or_above: IngestionSeverity,
    ) -> Self {
        self.observer = Some(observer);
        self.alert_at_or_above = alert_at_or_above;
        self
    }

    /// Ingest an upload, stamped with the current time.
    pub fn ingest(&self, file_name: &str, bytes: &[u8]) -> IngestResult<IngestOutcome> {
        self.ingest_at(file_name, bytes, Utc::now())
    }

    /// Ingest an upload with an explicit upload timestamp.
    pub fn ingest_at(
        &self,
        file_name: &str,
        bytes: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> IngestResult<IngestOutcome> {
        let ctx = IngestionContext {
            file_name: file_name.to_string(),
            bytes: bytes.len(),
        };
        let res = self.run(file_name, bytes, uploaded_at);

        if let Some(obs) = self.observer.as_ref() {
            match &res {
                Ok((outcome, rows)) => obs.on_success(
                    &ctx,
                    IngestionStats {
                        id: outcome.id,
                        rows: *rows,
                        skipped: outcome.skipped.len(),
                    },
                ),
                Err(e) => {
                    let sev = severity_for_error(e);
                    obs.on_failure(&ctx, sev, e);
                    if sev >= self.alert_at_or_above {
                        obs.on_alert(&ctx, sev, e);
                    }
                }
            }
        }
        res.map(|(outcome, _)| outcome)
    }

    fn run(
        &self,
        file_name: &str,
        bytes: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> IngestResult<(IngestOutcome, usize)> {
        let parsed = self.parser.parse(bytes)?;
        let rows = parsed.records.len();
        log::debug!(
            "parsed file={file_name} rows={rows} skipped={}",
            parsed.skipped.len()
        );

        let draft = DatasetDraft {
            file_name: file_name.to_string(),
            uploaded_at,
            records: parsed.records,
        };

        let store = Arc::clone(&self.store);
        let id = self
            .engine
            .run_with_timeout(JobKind::Persist, self.store_timeout, move |deadline| {
                store.save(draft, Some(deadline))
            })
            .map_err(|err| match err {
                JobError::TimedOut { elapsed } => StoreError::Timeout {
                    operation: "save",
                    elapsed_ms: elapsed.as_millis().min(u64::MAX as u128) as u64,
                },
                JobError::Failed { message } => StoreError::WriteFailure {
                    path: file_name.into(),
                    source: std::io::Error::other(message),
                },
            })??;

        Ok((
            IngestOutcome {
                id,
                skipped: parsed.skipped,
            },
            rows,
        ))
    }
}

