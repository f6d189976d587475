use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::execution::Deadline;
use crate::types::{Dataset, DatasetDraft, DatasetId, DatasetSummary, EquipmentRecord};

use super::{timed_out, DatasetStore};

const DATASET_EXT: &str = "json";

/// On-disk shape. Aggregates are not persisted; they are recomputed from `records` on load.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDataset {
    id: DatasetId,
    file_name: String,
    uploaded_at: DateTime<Utc>,
    records: Vec<EquipmentRecord>,
}

/// Stores each dataset as `<root>/<id>.json`.
///
/// A dataset is written to a temporary file, synced, and renamed into place, so a reader either
/// finds the complete file or no file. Reopening a directory resumes id assignment after the
/// highest id present.
pub struct DirectoryDatasetStore {
    root: PathBuf,
    next_id: Mutex<u64>,
    index: RwLock<Vec<DatasetSummary>>,
}

impl DirectoryDatasetStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::WriteFailure {
            path: root.clone(),
            source,
        })?;

        let mut index = Vec::new();
        let mut max_id = 0u64;
        for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::ReadFailure {
                path: root.clone(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATASET_EXT) {
                continue;
            }
            let Some(raw_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            // Ids of unreadable files are still burned so they are never handed out again.
            max_id = max_id.max(raw_id);
            match read_stored(path) {
                Ok(stored) => index.push(DatasetSummary {
                    id: stored.id,
                    file_name: stored.file_name,
                    uploaded_at: stored.uploaded_at,
                }),
                Err(err) => log::warn!("ignoring unreadable dataset file: {err}"),
            }
        }
        index.sort_by_key(|s| s.id);
        log::debug!(
            "opened dataset directory {} with {} datasets",
            root.display(),
            index.len()
        );

        Ok(Self {
            root,
            next_id: Mutex::new(max_id + 1),
            index: RwLock::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_path(&self, id: DatasetId) -> PathBuf {
        self.root.join(format!("{id}.{DATASET_EXT}"))
    }

    fn write_atomically(&self, path: &Path, bytes: &[u8], deadline: Option<Deadline>) -> StoreResult<()> {
        let tmp = path.with_extension(format!("{DATASET_EXT}.tmp"));
        let write = || -> io::Result<()> {
            let mut f = File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()
        };
        if let Err(source) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::WriteFailure { path: tmp, source });
        }

        if let Some(deadline) = deadline.as_ref().filter(|d| !d.try_commit()) {
            let _ = fs::remove_file(&tmp);
            return Err(timed_out("save", deadline));
        }

        fs::rename(&tmp, path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StoreError::WriteFailure {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

impl DatasetStore for DirectoryDatasetStore {
    fn save(&self, draft: DatasetDraft, deadline: Option<Deadline>) -> StoreResult<DatasetId> {
        let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let id = DatasetId::new(*next_id);
        // Burned even if the write fails below.
        *next_id += 1;

        let stored = StoredDataset {
            id,
            file_name: draft.file_name,
            uploaded_at: draft.uploaded_at,
            records: draft.records,
        };
        let path = self.dataset_path(id);
        let bytes = serde_json::to_vec_pretty(&stored).map_err(|e| StoreError::WriteFailure {
            path: path.clone(),
            source: io::Error::other(e),
        })?;
        self.write_atomically(&path, &bytes, deadline)?;

        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DatasetSummary {
                id,
                file_name: stored.file_name,
                uploaded_at: stored.uploaded_at,
            });
        log::debug!("stored dataset id={id} at {}", path.display());
        Ok(id)
    }

    fn get(&self, id: &DatasetId) -> StoreResult<Arc<Dataset>> {
        let path = self.dataset_path(*id);
        let stored = match read_stored(&path) {
            Ok(stored) => stored,
            Err(ReadError::Missing) => return Err(StoreError::NotFound { id: id.to_string() }),
            Err(ReadError::Invalid(message)) => return Err(StoreError::ReadFailure { path, message }),
        };
        if stored.id != *id {
            return Err(StoreError::ReadFailure {
                path,
                message: format!("file holds dataset {} instead of {id}", stored.id),
            });
        }

        let draft = DatasetDraft {
            file_name: stored.file_name,
            uploaded_at: stored.uploaded_at,
            records: stored.records,
        };
        Ok(Arc::new(Dataset::from_draft(stored.id, draft)))
    }

    fn list(&self) -> StoreResult<Vec<DatasetSummary>> {
        Ok(self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[derive(Debug)]
enum ReadError {
    Missing,
    Invalid(String),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Missing => f.write_str("file not found"),
            ReadError::Invalid(message) => f.write_str(message),
        }
    }
}

fn read_stored(path: &Path) -> Result<StoredDataset, ReadError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ReadError::Missing),
        Err(e) => return Err(ReadError::Invalid(format!("{}: {e}", path.display()))),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| ReadError::Invalid(format!("{}: {e}", path.display())))
}
