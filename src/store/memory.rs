use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::execution::Deadline;
use crate::types::{Dataset, DatasetDraft, DatasetId, DatasetSummary};

use super::{timed_out, DatasetStore};

struct Inner {
    next_id: u64,
    datasets: BTreeMap<DatasetId, Arc<Dataset>>,
}

/// Keeps datasets for the lifetime of the process.
///
/// Id assignment and insertion happen under one write lock, so concurrent saves get distinct
/// ids and readers see a dataset either fully or not at all.
pub struct InMemoryDatasetStore {
    inner: RwLock<Inner>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                datasets: BTreeMap::new(),
            }),
        }
    }

    /// Number of stored datasets.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .datasets
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetStore for InMemoryDatasetStore {
    fn save(&self, draft: DatasetDraft, deadline: Option<Deadline>) -> StoreResult<DatasetId> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(deadline) = deadline.as_ref().filter(|d| !d.try_commit()) {
            return Err(timed_out("save", deadline));
        }

        let id = DatasetId::new(inner.next_id);
        inner.next_id += 1;
        inner
            .datasets
            .insert(id, Arc::new(Dataset::from_draft(id, draft)));
        log::debug!("stored dataset id={id} in memory");
        Ok(id)
    }

    fn get(&self, id: &DatasetId) -> StoreResult<Arc<Dataset>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .datasets
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn list(&self) -> StoreResult<Vec<DatasetSummary>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .datasets
            .values()
            .map(|ds| ds.summary())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryDatasetStore;
    use crate::error::StoreError;
    use crate::execution::Deadline;
    use crate::store::DatasetStore;
    use crate::types::{DatasetDraft, DatasetId, EquipmentRecord};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn draft(name: &str) -> DatasetDraft {
        let records = vec![EquipmentRecord::new("P1", "Pump", 1.0, 2.0, 3.0)];
        DatasetDraft {
            file_name: name.to_string(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            records,
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let store = InMemoryDatasetStore::new();
        assert_eq!(store.save(draft("a.csv"), None).unwrap(), DatasetId::new(1));
        assert_eq!(store.save(draft("b.csv"), None).unwrap(), DatasetId::new(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_deadline_publishes_nothing() {
        let store = InMemoryDatasetStore::new();
        let deadline = Deadline::after(Duration::ZERO);
        match store.save(draft("a.csv"), Some(deadline)) {
            Err(StoreError::Timeout { operation, .. }) => assert_eq!(operation, "save"),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(store.is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn save_commits_the_deadline_it_is_given() {
        let store = InMemoryDatasetStore::new();
        let deadline = Deadline::after(Duration::from_secs(5));
        let id = store.save(draft("a.csv"), Some(deadline.clone())).unwrap();
        assert_eq!(store.get(&id).unwrap().aggregates.total_count, 1);
        // A committed deadline stays committed.
        assert!(deadline.try_commit());
    }
}
