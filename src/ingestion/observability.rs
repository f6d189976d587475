use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::error::{IngestError, ParseError};
use crate::types::DatasetId;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Non-fatal problem (e.g. rows skipped on an otherwise successful upload).
    Warning,
    /// The upload was rejected.
    Error,
    /// Infrastructure failure (storage unavailable, timeouts).
    Critical,
}

/// Context about an ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Name of the uploaded file.
    pub file_name: String,
    /// Size of the upload in bytes.
    pub bytes: usize,
}

/// Stats reported on successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Id assigned by the store.
    pub id: DatasetId,
    /// Number of stored rows.
    pub rows: usize,
    /// Number of rows skipped during parsing.
    pub skipped: usize,
}

impl IngestionStats {
    /// `Warning` when rows were skipped, otherwise `Info`.
    pub fn severity(&self) -> IngestionSeverity {
        if self.skipped > 0 {
            IngestionSeverity::Warning
        } else {
            IngestionSeverity::Info
        }
    }
}

/// Severity of an ingestion failure.
pub fn severity_for_error(e: &IngestError) -> IngestionSeverity {
    match e {
        IngestError::Parse(ParseError::Malformed(err)) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        IngestError::Parse(_) => IngestionSeverity::Error,
        IngestError::Store(_) => IngestionSeverity::Critical,
    }
}

/// Observer interface for ingestion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when ingestion succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when ingestion fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestError) {}

    /// Called when an ingestion failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards ingestion events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl IngestionObserver for LogObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        if stats.skipped > 0 {
            log::warn!(
                "ingested file={} id={} rows={} skipped={}",
                ctx.file_name,
                stats.id,
                stats.rows,
                stats.skipped
            );
        } else {
            log::info!(
                "ingested file={} id={} rows={}",
                ctx.file_name,
                stats.id,
                stats.rows
            );
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        log::error!(
            "ingest failed severity={:?} file={} bytes={} err={}",
            severity,
            ctx.file_name,
            ctx.bytes,
            error
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        log::error!(
            "[ALERT] ingest failed severity={:?} file={} err={}",
            severity,
            ctx.file_name,
            error
        );
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339());
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "ok severity={:?} file={} id={} rows={} skipped={}",
            stats.severity(),
            ctx.file_name,
            stats.id,
            stats.rows,
            stats.skipped
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.append_line(&format!(
            "fail severity={:?} file={} err={}",
            severity, ctx.file_name, error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestError) {
        self.append_line(&format!(
            "ALERT severity={:?} file={} err={}",
            severity, ctx.file_name, error
        ));
    }
}
