//! Reports regenerated from stored datasets.
//!
//! [`ReportGenerator`] produces two views of the same [`crate::types::Dataset`]:
//!
//! - [`SummaryPayload`]: the JSON summary (`id, file_name, uploaded_at, total_count,
//!   type_distribution, averages, data`)
//! - a paginated PDF document (see [`render`])
//!
//! Both are rebuilt from the store on every call; nothing rendered is cached. Averages are
//! rounded by [`Precision`] in both views.

pub mod format;
pub mod pdf;
pub mod render;
mod summary;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ReportError, ReportResult};
use crate::execution::{ExecutionEngine, JobError, JobKind};
use crate::store::DatasetStore;
use crate::types::DatasetId;

pub use format::Precision;
pub use summary::SummaryPayload;

/// Default upper bound on PDF rendering.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds summaries and PDF reports for stored datasets.
pub struct ReportGenerator {
    store: Arc<dyn DatasetStore>,
    engine: Arc<ExecutionEngine>,
    precision: Precision,
    render_timeout: Duration,
}

impl ReportGenerator {
    pub fn new(store: Arc<dyn DatasetStore>, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            store,
            engine,
            precision: Precision::default(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// JSON summary of dataset `id`.
    pub fn summary(&self, id: &DatasetId) -> ReportResult<SummaryPayload> {
        let dataset = self.store.get(id)?;
        Ok(SummaryPayload::from_dataset(&dataset, self.precision))
    }

    /// PDF report of dataset `id`, rendered on the execution pool under the render timeout.
    pub fn pdf(&self, id: &DatasetId) -> ReportResult<Vec<u8>> {
        let dataset = self.store.get(id)?;
        let precision = self.precision;
        let bytes = self
            .engine
            .run_with_timeout(JobKind::Render, self.render_timeout, move |_| {
                render::render_dataset_pdf(&dataset, precision)
            })
            .map_err(|err| match err {
                JobError::TimedOut { elapsed } => ReportError::Timeout {
                    elapsed_ms: elapsed.as_millis().min(u64::MAX as u128) as u64,
                },
                JobError::Failed { message } => ReportError::Render { message },
            })?;
        log::debug!("rendered pdf for dataset id={id} ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

/// Download name for a dataset's PDF report.
pub fn pdf_file_name(id: &DatasetId) -> String {
    format!("report_{id}.pdf")
}
