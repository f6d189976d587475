//! Display formatting shared by the JSON summary and the PDF report.
//!
//! Both outputs must agree on displayed numbers, so the rounding rule lives only here.

use chrono::{DateTime, SecondsFormat, Utc};

/// Largest supported number of decimal places.
pub const MAX_DECIMAL_PLACES: u32 = 6;

/// Display precision for derived statistics.
///
/// Rounds half away from zero to a fixed number of decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    decimal_places: u32,
}

impl Precision {
    /// # Panics
    ///
    /// Panics if `decimal_places > MAX_DECIMAL_PLACES`.
    pub fn new(decimal_places: u32) -> Self {
        assert!(
            decimal_places <= MAX_DECIMAL_PLACES,
            "decimal_places must be <= {MAX_DECIMAL_PLACES}"
        );
        Self { decimal_places }
    }

    pub fn decimal_places(self) -> u32 {
        self.decimal_places
    }

    /// The rounding rule.
    pub fn round(self, value: f64) -> f64 {
        // From 2^52 up every f64 is an integer, and scaling could overflow.
        if !value.is_finite() || value.abs() >= 4_503_599_627_370_496.0 {
            return value;
        }
        let factor = 10f64.powi(self.decimal_places as i32);
        let rounded = (value * factor).round() / factor;
        // Avoid "-0.00" for tiny negatives.
        if rounded == 0.0 { 0.0 } else { rounded }
    }

    /// `round(value)` with exactly `decimal_places` digits.
    pub fn format(self, value: f64) -> String {
        format!("{:.*}", self.decimal_places as usize, self.round(value))
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Upload timestamps are shown as RFC 3339 with second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, Precision, MAX_DECIMAL_PLACES};
    use chrono::{TimeZone, Utc};

    #[test]
    fn rounds_half_away_from_zero() {
        let p = Precision::default();
        assert_eq!(p.round(35.0 / 3.0), 11.67);
        assert_eq!(p.round(2.125), 2.13);
        assert_eq!(p.round(-2.125), -2.13);
        assert_eq!(p.round(-0.001), 0.0);
        assert_eq!(p.format(5.0), "5.00");
        assert_eq!(p.format(-0.001), "0.00");
    }

    #[test]
    fn huge_values_are_left_as_is() {
        let p = Precision::new(MAX_DECIMAL_PLACES);
        assert_eq!(p.round(1e308), 1e308);
        assert_eq!(p.round(-f64::MAX), -f64::MAX);
        assert_eq!(Precision::default().round(1e300), 1e300);
    }

    #[test]
    fn zero_places_rounds_to_integers() {
        let p = Precision::new(0);
        assert_eq!(p.round(2.5), 3.0);
        assert_eq!(p.format(2.5), "3");
    }

    #[test]
    fn timestamp_is_rfc3339_seconds_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-05-06T07:08:09Z");
    }
}
