//! CSV upload parsing.

use std::collections::BTreeMap;

use crate::error::{ParseError, ParseResult};
use crate::types::{EquipmentRecord, NumericField, SkippedRow};

/// Canonical column names every upload must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "equipment_name",
    "equipment_type",
    "flowrate",
    "pressure",
    "temperature",
];

/// Output of a successful parse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedRecords {
    /// Valid rows, in input order.
    pub records: Vec<EquipmentRecord>,
    /// Rows excluded from `records`, in input order.
    pub skipped: Vec<SkippedRow>,
}

/// Parses raw upload bytes into [`EquipmentRecord`]s.
///
/// Rules:
///
/// - The upload must have a header row containing all [`REQUIRED_COLUMNS`]. Matching is
///   case-insensitive, ignores surrounding whitespace, treats spaces and hyphens as `_`, and
///   consults the alias table (so `Equipment Name` and `Type` are accepted).
/// - Column order is free; extra columns are ignored.
/// - A row with an empty name/type or a numeric cell that is not a finite number is skipped
///   and reported, not fatal.
/// - If no valid row remains the whole upload fails with [`ParseError::EmptyDataset`].
#[derive(Debug, Clone)]
pub struct CsvRecordParser {
    aliases: BTreeMap<String, String>,
}

impl Default for CsvRecordParser {
    fn default() -> Self {
        Self::new(default_header_aliases())
    }
}

/// Alias table used when none is configured.
pub fn default_header_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("name".to_string(), "equipment_name".to_string()),
        ("type".to_string(), "equipment_type".to_string()),
    ])
}

impl CsvRecordParser {
    /// Create a parser with an alias table mapping normalized header names onto canonical ones.
    pub fn new(aliases: BTreeMap<String, String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(from, to)| (normalize_header(&from), normalize_header(&to)))
            .collect();
        Self { aliases }
    }

    /// Parse an upload.
    pub fn parse(&self, bytes: &[u8]) -> ParseResult<ParsedRecords> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);
        let headers = rdr.headers()?.clone();

        let canonical: Vec<String> = headers
            .iter()
            .map(|h| self.canonical_header(h))
            .collect();
        let mut col_idxs = [0usize; REQUIRED_COLUMNS.len()];
        let mut missing = Vec::new();
        for (slot, required) in col_idxs.iter_mut().zip(REQUIRED_COLUMNS) {
            match canonical.iter().position(|h| h == required) {
                Some(idx) => *slot = idx,
                None => missing.push(required.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(ParseError::MissingColumns {
                missing,
                headers: headers.iter().map(str::to_string).collect(),
            });
        }

        let mut parsed = ParsedRecords::default();
        for (row_idx0, result) in rdr.records().enumerate() {
            // Fallback when the reader has no position: header is line 1.
            let fallback_line = row_idx0 as u64 + 2;
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    let line = err
                        .position()
                        .map(|p| p.line())
                        .unwrap_or(fallback_line);
                    parsed.skipped.push(SkippedRow {
                        line,
                        reason: format!("unreadable row: {err}"),
                    });
                    continue;
                }
            };
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(fallback_line);

            match record_from_row(&record, &col_idxs) {
                Ok(rec) => parsed.records.push(rec),
                Err(reason) => parsed.skipped.push(SkippedRow { line, reason }),
            }
        }

        if parsed.records.is_empty() {
            return Err(ParseError::EmptyDataset {
                skipped: parsed.skipped,
            });
        }
        Ok(parsed)
    }

    fn canonical_header(&self, raw: &str) -> String {
        let normalized = normalize_header(raw);
        match self.aliases.get(&normalized) {
            Some(target) => target.clone(),
            None => normalized,
        }
    }
}

/// Parse with the default alias table.
pub fn parse_equipment_csv(bytes: &[u8]) -> ParseResult<ParsedRecords> {
    CsvRecordParser::default().parse(bytes)
}

/// Lowercase, trim, drop a byte-order mark, and fold spaces/hyphens into `_`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn record_from_row(record: &csv::StringRecord, col_idxs: &[usize; 5]) -> Result<EquipmentRecord, String> {
    let cell = |slot: usize| cell_at(record, col_idxs[slot], REQUIRED_COLUMNS[slot]);

    let name = cell(0)?;
    if name.is_empty() {
        return Err("empty equipment_name".to_string());
    }
    let equipment_type = cell(1)?;
    if equipment_type.is_empty() {
        return Err("empty equipment_type".to_string());
    }

    let mut values = [0.0f64; 3];
    for (i, field) in NumericField::ALL.iter().enumerate() {
        values[i] = parse_finite(field.column(), cell(2 + i)?)?;
    }

    Ok(EquipmentRecord::new(
        name,
        equipment_type,
        values[0],
        values[1],
        values[2],
    ))
}

fn cell_at<'a>(record: &'a csv::StringRecord, idx: usize, column: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| format!("missing value for column '{column}'"))
}

fn parse_finite(column: &str, raw: &str) -> Result<f64, String> {
    let v = raw
        .parse::<f64>()
        .map_err(|e| format!("column '{column}': invalid number '{raw}' ({e})"))?;
    if !v.is_finite() {
        return Err(format!("column '{column}': non-finite value '{raw}'"));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::{normalize_header, parse_equipment_csv, CsvRecordParser};
    use crate::error::ParseError;
    use std::collections::BTreeMap;

    #[test]
    fn normalize_header_folds_case_space_and_bom() {
        assert_eq!(normalize_header("\u{feff} Equipment Name "), "equipment_name");
        assert_eq!(normalize_header("Flow-Rate"), "flow_rate");
    }

    #[test]
    fn skips_non_finite_and_empty_cells_with_line_numbers() {
        let input = "equipment_name,equipment_type,flowrate,pressure,temperature\n\
                     Pump1,Pump,10,5,20\n\
                     Pump2,Pump,NaN,5,20\n\
                     ,Valve,1,2,3\n\
                     Valve1,  ,1,2,3\n\
                     Valve2,Valve,1,2\n\
                     Valve3,Valve,1,2,3\n";
        let parsed = parse_equipment_csv(input.as_bytes()).unwrap();

        let names: Vec<_> = parsed.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Pump1", "Valve3"]);

        let lines: Vec<_> = parsed.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        assert!(parsed.skipped[0].reason.contains("non-finite"));
        assert!(parsed.skipped[1].reason.contains("equipment_name"));
        assert!(parsed.skipped[2].reason.contains("equipment_type"));
        assert!(parsed.skipped[3].reason.contains("temperature"));
    }

    #[test]
    fn empty_upload_reports_all_columns_missing() {
        match parse_equipment_csv(b"") {
            Err(ParseError::MissingColumns { missing, .. }) => assert_eq!(missing.len(), 5),
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn custom_aliases_are_normalized() {
        let parser = CsvRecordParser::new(BTreeMap::from([
            ("Unit".to_string(), "equipment_name".to_string()),
            ("Kind".to_string(), "equipment_type".to_string()),
        ]));
        let parsed = parser
            .parse(b"unit,kind,flowrate,pressure,temperature\nR1,Reactor,1,2,3\n")
            .unwrap();
        assert_eq!(parsed.records[0].equipment_type, "Reactor");
    }
}
