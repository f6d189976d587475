//! Dataset persistence.
//!
//! [`DatasetStore`] is append-only: a dataset is published atomically by [`DatasetStore::save`]
//! and never changes afterwards. Two implementations are provided:
//!
//! - [`InMemoryDatasetStore`]: process-lifetime storage behind an `RwLock`
//! - [`DirectoryDatasetStore`]: one JSON file per dataset, published by atomic rename
//!
//! Ids are assigned by the store, strictly increasing in save order, and never reused. `list()`
//! returns entries in ascending id order, which is upload order.
//!
//! The trait is object-safe, so a caching or instrumenting decorator can wrap any store behind
//! `Arc<dyn DatasetStore>` without callers noticing.

mod directory;
mod memory;

use std::sync::Arc;

use crate::error::StoreResult;
use crate::execution::Deadline;
use crate::types::{Dataset, DatasetDraft, DatasetId, DatasetSummary};

pub use directory::DirectoryDatasetStore;
pub use memory::InMemoryDatasetStore;

/// Storage for uploaded datasets.
pub trait DatasetStore: Send + Sync {
    /// Assign a fresh id and publish `draft` under it.
    ///
    /// With a `deadline`, the store commits through [`Deadline::try_commit`] immediately before
    /// the dataset becomes visible. If that fails, nothing is published and
    /// [`crate::StoreError::Timeout`] is returned.
    fn save(&self, draft: DatasetDraft, deadline: Option<Deadline>) -> StoreResult<DatasetId>;

    /// Fetch a dataset, or [`crate::StoreError::NotFound`].
    fn get(&self, id: &DatasetId) -> StoreResult<Arc<Dataset>>;

    /// All datasets as history entries, oldest first.
    fn list(&self) -> StoreResult<Vec<DatasetSummary>>;

    /// The newest `limit` history entries, newest first.
    fn recent(&self, limit: usize) -> StoreResult<Vec<DatasetSummary>> {
        let mut all = self.list()?;
        let keep_from = all.len().saturating_sub(limit);
        let mut newest = all.split_off(keep_from);
        newest.reverse();
        Ok(newest)
    }
}

impl<S: DatasetStore + ?Sized> DatasetStore for Arc<S> {
    fn save(&self, draft: DatasetDraft, deadline: Option<Deadline>) -> StoreResult<DatasetId> {
        (**self).save(draft, deadline)
    }

    fn get(&self, id: &DatasetId) -> StoreResult<Arc<Dataset>> {
        (**self).get(id)
    }

    fn list(&self) -> StoreResult<Vec<DatasetSummary>> {
        (**self).list()
    }

    fn recent(&self, limit: usize) -> StoreResult<Vec<DatasetSummary>> {
        (**self).recent(limit)
    }
}

fn timed_out(operation: &'static str, deadline: &Deadline) -> crate::error::StoreError {
    crate::error::StoreError::Timeout {
        operation,
        elapsed_ms: deadline.elapsed().as_millis().min(u64::MAX as u128) as u64,
    }
}
