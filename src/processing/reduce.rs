//! Reductions over a numeric field of a record slice.

use crate::types::{EquipmentRecord, NumericField};

/// Built-in reduction operations over a single numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Number of records.
    Count,
    /// Sum of values.
    Sum,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Arithmetic mean. Finite whenever every value is finite, even where `Sum` overflows.
    Mean,
}

/// Reduce `field` over `records`.
///
/// - `Count` always returns `Some(len as f64)`.
/// - `Sum` of no records is `Some(0.0)`; `Mean` of no records is `Some(0.0)`.
/// - `Min`/`Max` of no records is `None`.
pub fn reduce(records: &[EquipmentRecord], field: NumericField, op: ReduceOp) -> Option<f64> {
    let values = records.iter().map(|r| r.value(field));
    match op {
        ReduceOp::Count => Some(records.len() as f64),
        ReduceOp::Sum => Some(values.sum()),
        ReduceOp::Min => values.reduce(f64::min),
        ReduceOp::Max => values.reduce(f64::max),
        ReduceOp::Mean => Some(running_mean(values)),
    }
}

/// Incremental mean. No intermediate exceeds the largest input magnitude, and the result is
/// clamped to the observed range to absorb rounding.
fn running_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (mut mean, mut lo, mut hi) = (0.0_f64, f64::INFINITY, f64::NEG_INFINITY);
    for (n, v) in (1u64..).zip(values) {
        let n = n as f64;
        mean = mean - mean / n + v / n;
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo > hi { 0.0 } else { mean.clamp(lo, hi) }
}

#[cfg(test)]
mod tests {
    use super::{reduce, ReduceOp};
    use crate::types::{EquipmentRecord, NumericField};

    fn records() -> Vec<EquipmentRecord> {
        vec![
            EquipmentRecord::new("a", "Pump", 10.0, 1.0, 100.0),
            EquipmentRecord::new("b", "Pump", 5.5, 2.0, 90.0),
            EquipmentRecord::new("c", "Valve", 0.5, 3.0, 95.0),
        ]
    }

    #[test]
    fn reduce_count_counts_records() {
        assert_eq!(reduce(&records(), NumericField::Flowrate, ReduceOp::Count), Some(3.0));
    }

    #[test]
    fn reduce_sum_and_mean() {
        let rs = records();
        assert_eq!(reduce(&rs, NumericField::Flowrate, ReduceOp::Sum), Some(16.0));
        assert_eq!(reduce(&rs, NumericField::Pressure, ReduceOp::Mean), Some(2.0));
    }

    #[test]
    fn mean_of_huge_values_does_not_overflow() {
        let huge = vec![
            EquipmentRecord::new("a", "Pump", 1e308, f64::MAX, 1.0),
            EquipmentRecord::new("b", "Pump", 1e308, -f64::MAX, 1.0),
        ];
        assert_eq!(reduce(&huge, NumericField::Flowrate, ReduceOp::Sum), Some(f64::INFINITY));
        assert_eq!(reduce(&huge, NumericField::Flowrate, ReduceOp::Mean), Some(1e308));
        assert_eq!(reduce(&huge, NumericField::Pressure, ReduceOp::Mean), Some(0.0));
    }

    #[test]
    fn reduce_min_max() {
        let rs = records();
        assert_eq!(reduce(&rs, NumericField::Temperature, ReduceOp::Min), Some(90.0));
        assert_eq!(reduce(&rs, NumericField::Temperature, ReduceOp::Max), Some(100.0));
    }

    #[test]
    fn reduce_over_no_records() {
        assert_eq!(reduce(&[], NumericField::Flowrate, ReduceOp::Count), Some(0.0));
        assert_eq!(reduce(&[], NumericField::Flowrate, ReduceOp::Sum), Some(0.0));
        assert_eq!(reduce(&[], NumericField::Flowrate, ReduceOp::Mean), Some(0.0));
        assert_eq!(reduce(&[], NumericField::Flowrate, ReduceOp::Min), None);
        assert_eq!(reduce(&[], NumericField::Flowrate, ReduceOp::Max), None);
    }
}
