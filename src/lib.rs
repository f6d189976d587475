//! `equipment-analytics` turns uploaded equipment CSV files into stored, immutable datasets and
//! produces reports from them.
//!
//! The primary entrypoint is [`EquipmentAnalytics`], which bundles the four operations:
//!
//! - **ingest**: parse an upload, aggregate it, store it, return its id
//! - **history**: list stored datasets (or only the most recent few)
//! - **summary**: JSON summary of one dataset
//! - **pdf**: a paginated PDF report of one dataset
//!
//! ## What an upload looks like
//!
//! A CSV file with a header row naming (in any order, case-insensitively) the columns
//! `equipment_name`, `equipment_type`, `flowrate`, `pressure`, `temperature`. Extra columns
//! are ignored. Rows with empty names/types or non-numeric values are skipped and reported;
//! an upload with no valid rows is rejected and nothing is stored.
//!
//! ## Quick example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use equipment_analytics::config::AnalyticsConfig;
//! use equipment_analytics::store::InMemoryDatasetStore;
//! use equipment_analytics::EquipmentAnalytics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = EquipmentAnalytics::new(
//!     &AnalyticsConfig::default(),
//!     Arc::new(InMemoryDatasetStore::new()),
//! );
//!
//! let csv = "equipment_name,equipment_type,flowrate,pressure,temperature\n\
//!            Pump1,Pump,10,5,20\n\
//!            Pump2,Pump,20,7,22\n\
//!            Valve1,Valve,5,3,18\n";
//! let outcome = app.ingest("plant.csv", csv.as_bytes())?;
//!
//! let summary = app.summary(&outcome.id)?;
//! assert_eq!(summary.total_count, 3);
//! assert_eq!(summary.averages.flowrate, 11.67);
//!
//! let pdf = app.pdf(&outcome.id)?;
//! assert!(pdf.starts_with(b"%PDF"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: CSV parsing, the ingestion service and its observers
//! - [`processing`]: aggregation over validated records
//! - [`store`]: the [`store::DatasetStore`] trait with in-memory and on-disk implementations
//! - [`report`]: JSON summaries and PDF rendering
//! - [`execution`]: bounded, timed execution of store and render jobs
//! - [`config`]: TOML configuration
//! - [`auth`]: pluggable credential verification for front ends
//! - [`types`], [`error`]: data model and error types

pub mod auth;
pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod processing;
pub mod report;
pub mod store;
pub mod types;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use error::{
    AuthError, ConfigError, IngestError, IngestResult, ParseError, ParseResult, ReportError,
    ReportResult, StoreError, StoreResult,
};

use config::AnalyticsConfig;
use execution::ExecutionEngine;
use ingestion::{IngestOutcome, IngestionObserver, IngestionService, IngestionSeverity};
use report::{ReportGenerator, SummaryPayload};
use store::DatasetStore;
use types::{DatasetId, DatasetSummary};

/// Ingestion, history and reporting over one [`DatasetStore`].
pub struct EquipmentAnalytics {
    store: Arc<dyn DatasetStore>,
    ingestion: IngestionService,
    reports: ReportGenerator,
    history_limit: usize,
}

impl fmt::Debug for EquipmentAnalytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EquipmentAnalytics")
            .field("ingestion", &self.ingestion)
            .field("precision", &self.reports.precision())
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

impl EquipmentAnalytics {
    /// Wire up the pipeline from `config` on top of `store`.
    ///
    /// # Panics
    ///
    /// Panics if `config` has not been validated and holds values that
    /// [`AnalyticsConfig::validate`] would reject (e.g. `num_threads = Some(0)`).
    pub fn new(config: &AnalyticsConfig, store: Arc<dyn DatasetStore>) -> Self {
        let engine = Arc::new(ExecutionEngine::new(config.execution_options()));
        Self::with_engine(config, store, engine)
    }

    /// Like [`Self::new`], sharing an existing engine.
    pub fn with_engine(
        config: &AnalyticsConfig,
        store: Arc<dyn DatasetStore>,
        engine: Arc<ExecutionEngine>,
    ) -> Self {
        let ingestion = IngestionService::new(Arc::clone(&store), Arc::clone(&engine))
            .with_parser(config.parser())
            .with_store_timeout(config.store_timeout());
        let reports = ReportGenerator::new(Arc::clone(&store), engine)
            .with_precision(config.precision())
            .with_render_timeout(config.report_timeout());
        Self {
            store,
            ingestion,
            reports,
            history_limit: config.history_limit,
        }
    }

    /// Report ingestion outcomes to `observer`, alerting at or above `alert_at_or_above`.
    pub fn with_observer(
        mut self,
        observer: Arc<dyn IngestionObserver>,
        alert_at_or_above: IngestionSeverity,
    ) -> Self {
        self.ingestion = self.ingestion.with_observer(observer, alert_at_or_above);
        self
    }

    pub fn ingest(&self, file_name: &str, bytes: &[u8]) -> IngestResult<IngestOutcome> {
        self.ingestion.ingest(file_name, bytes)
    }

    pub fn ingest_at(
        &self,
        file_name: &str,
        bytes: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> IngestResult<IngestOutcome> {
        self.ingestion.ingest_at(file_name, bytes, uploaded_at)
    }

    /// Every stored dataset, oldest first.
    pub fn history(&self) -> StoreResult<Vec<DatasetSummary>> {
        self.store.list()
    }

    /// The configured number of most recent datasets, newest first.
    pub fn recent(&self) -> StoreResult<Vec<DatasetSummary>> {
        self.store.recent(self.history_limit)
    }

    pub fn summary(&self, id: &DatasetId) -> ReportResult<SummaryPayload> {
        self.reports.summary(id)
    }

    pub fn pdf(&self, id: &DatasetId) -> ReportResult<Vec<u8>> {
        self.reports.pdf(id)
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }
}
