use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Averages, Dataset, DatasetId, EquipmentRecord, TypeCount};

use super::format::Precision;

/// JSON summary of one dataset, as consumed by the reporting surface.
///
/// Field names and order are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub id: DatasetId,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub total_count: usize,
    pub type_distribution: Vec<TypeCount>,
    /// Rounded with the report [`Precision`].
    pub averages: Averages,
    pub data: Vec<EquipmentRecord>,
}

impl SummaryPayload {
    pub fn from_dataset(dataset: &Dataset, precision: Precision) -> Self {
        let avg = dataset.aggregates.averages;
        Self {
            id: dataset.id,
            file_name: dataset.file_name.clone(),
            uploaded_at: dataset.uploaded_at,
            total_count: dataset.aggregates.total_count,
            type_distribution: dataset.aggregates.type_distribution.clone(),
            averages: Averages {
                flowrate: precision.round(avg.flowrate),
                pressure: precision.round(avg.pressure),
                temperature: precision.round(avg.temperature),
            },
            data: dataset.records.clone(),
        }
    }
}
