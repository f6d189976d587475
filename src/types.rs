//! Core data model.
//!
//! Ingestion turns upload bytes into [`EquipmentRecord`]s; the store wraps them, with their
//! [`Aggregates`], into an immutable [`Dataset`] keyed by a [`DatasetId`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One validated equipment reading. All numeric fields are finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    /// Equipment name.
    #[serde(rename = "equipment_name")]
    pub name: String,
    /// Equipment type (grouping key, case-sensitive).
    pub equipment_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

impl EquipmentRecord {
    /// Create a record. Callers are responsible for validation; see [`crate::ingestion::csv`].
    pub fn new(
        name: impl Into<String>,
        equipment_type: impl Into<String>,
        flowrate: f64,
        pressure: f64,
        temperature: f64,
    ) -> Self {
        Self {
            name: name.into(),
            equipment_type: equipment_type.into(),
            flowrate,
            pressure,
            temperature,
        }
    }

    /// Value of a numeric field.
    pub fn value(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Flowrate => self.flowrate,
            NumericField::Pressure => self.pressure,
            NumericField::Temperature => self.temperature,
        }
    }
}

/// The numeric parameters carried by every [`EquipmentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    Flowrate,
    Pressure,
    Temperature,
}

impl NumericField {
    /// All numeric fields, in column order.
    pub const ALL: [NumericField; 3] = [Self::Flowrate, Self::Pressure, Self::Temperature];

    /// Canonical column name.
    pub fn column(self) -> &'static str {
        match self {
            Self::Flowrate => "flowrate",
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
        }
    }
}

/// Count of records sharing one equipment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub equipment_type: String,
    pub count: usize,
}

/// Arithmetic means of the numeric fields. Unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Averages {
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

impl Averages {
    pub fn get(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Flowrate => self.flowrate,
            NumericField::Pressure => self.pressure,
            NumericField::Temperature => self.temperature,
        }
    }
}

/// Statistics derived from a dataset's records.
///
/// Invariant: `type_distribution` counts sum to `total_count`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregates {
    pub total_count: usize,
    /// One entry per distinct type, in first-seen order.
    pub type_distribution: Vec<TypeCount>,
    pub averages: Averages,
}

/// A data row that was excluded during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based line number in the upload (the header is line 1).
    pub line: u64,
    pub reason: String,
}

/// Store-assigned dataset identifier.
///
/// Ids increase monotonically in upload order and are never reused by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(u64);

impl DatasetId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsing never fails for any other reason than "no such dataset": a string that is not a
/// valid id cannot name a stored dataset.
impl FromStr for DatasetId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| StoreError::NotFound { id: s.to_string() })
    }
}

/// Input to [`crate::store::DatasetStore::save`]: everything except the id.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDraft {
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub records: Vec<EquipmentRecord>,
}

/// One persisted upload. Never mutated after the store publishes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: DatasetId,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub records: Vec<EquipmentRecord>,
    pub aggregates: Aggregates,
}

impl Dataset {
    /// Attach a store-assigned id to a draft. Aggregates are always derived from the records.
    pub fn from_draft(id: DatasetId, draft: DatasetDraft) -> Self {
        Self {
            id,
            aggregates: crate::processing::aggregate(&draft.records),
            file_name: draft.file_name,
            uploaded_at: draft.uploaded_at,
            records: draft.records,
        }
    }

    /// History projection of this dataset.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// History entry: a dataset without its record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: DatasetId,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}
