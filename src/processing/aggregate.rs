//! Dataset-level statistics.

use std::collections::HashMap;

use crate::types::{Aggregates, Averages, EquipmentRecord, NumericField, TypeCount};

use super::reduce::{reduce, ReduceOp};

/// Compute [`Aggregates`] for `records`.
///
/// - `type_distribution` groups by the exact (case-sensitive) type string, in first-seen order.
/// - Each average is the plain `f64` mean of its field; `0.0` when `records` is empty.
/// - No rounding is applied; display precision is a reporting concern.
pub fn aggregate(records: &[EquipmentRecord]) -> Aggregates {
    let mut type_distribution: Vec<TypeCount> = Vec::new();
    let mut slot_by_type: HashMap<&str, usize> = HashMap::new();
    for rec in records {
        match slot_by_type.get(rec.equipment_type.as_str()) {
            Some(&slot) => type_distribution[slot].count += 1,
            None => {
                slot_by_type.insert(rec.equipment_type.as_str(), type_distribution.len());
                type_distribution.push(TypeCount {
                    equipment_type: rec.equipment_type.clone(),
                    count: 1,
                });
            }
        }
    }

    let mean = |field: NumericField| reduce(records, field, ReduceOp::Mean).unwrap_or(0.0);

    Aggregates {
        total_count: records.len(),
        type_distribution,
        averages: Averages {
            flowrate: mean(NumericField::Flowrate),
            pressure: mean(NumericField::Pressure),
            temperature: mean(NumericField::Temperature),
        },
    }
}
