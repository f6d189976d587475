//! In-memory statistics over validated records.
//!
//! - [`aggregate()`]: per-type counts and per-parameter averages for a whole dataset
//! - [`reduce()`]: single-field reductions (count/sum/min/max/mean) it is built on
//!
//! ## Example
//!
//! ```rust
//! use equipment_analytics::processing::{aggregate, reduce, ReduceOp};
//! use equipment_analytics::types::{EquipmentRecord, NumericField};
//!
//! let records = vec![
//!     EquipmentRecord::new("Pump1", "Pump", 10.0, 5.0, 20.0),
//!     EquipmentRecord::new("Pump2", "Pump", 20.0, 7.0, 22.0),
//!     EquipmentRecord::new("Valve1", "Valve", 5.0, 3.0, 18.0),
//! ];
//!
//! let agg = aggregate(&records);
//! assert_eq!(agg.total_count, 3);
//! assert_eq!(agg.type_distribution[0].equipment_type, "Pump");
//! assert_eq!(agg.type_distribution[0].count, 2);
//! assert_eq!(agg.averages.pressure, 5.0);
//!
//! let max_flow = reduce(&records, NumericField::Flowrate, ReduceOp::Max);
//! assert_eq!(max_flow, Some(20.0));
//! ```

pub mod aggregate;
pub mod reduce;

pub use aggregate::aggregate;
pub use reduce::{reduce, ReduceOp};
