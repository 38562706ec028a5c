//! Readers for ENEDIS load-curve exports (semicolon CSV and Excel workbooks)

pub mod csv_importer;
pub mod excel_importer;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::series::Timestamp;
use crate::units::Unit;

// Re-export commonly used items
pub use csv_importer::{CsvImportError, CsvImporter};
pub use excel_importer::{ExcelImportError, ExcelImporter};

/// A cell value as found in the export, before classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RawValue {
    Empty,
    Number(f64),
    Text(String),
}

/// One data row of an export with a readable timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    /// Zero-based index of the data row in the source file
    pub row: usize,
    pub timestamp: Timestamp,
    pub value: RawValue,
}

/// A row dropped by a reader because its timestamp could not be read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Everything a reader extracted from one export file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSeries {
    pub records: Vec<RawRecord>,
    pub skipped_rows: Vec<SkippedRow>,
    /// Unit of the values in `records`
    pub unit: Unit,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Csv(#[from] CsvImportError),

    #[error(transparent)]
    Excel(#[from] ExcelImportError),
}

/// Read an export, choosing the reader from the file extension.
///
/// `.xlsx` files are ENEDIS workbooks (values in kW); anything else is read as
/// a semicolon CSV whose values are in `csv_unit`.
pub fn read_export(path: &Path, value_column: &str, csv_unit: Unit) -> Result<RawSeries, ImportError> {
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    if is_workbook {
        Ok(ExcelImporter::new(path.to_string_lossy()).parse_consumption_sheet()?)
    } else {
        Ok(CsvImporter::new(path)
            .with_value_column(value_column)
            .with_unit(csv_unit)
            .read()?)
    }
}

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M",
];

/// Parse a meter timestamp, keeping the local wall-clock time when an offset is given
///
/// # Examples
///
/// ```
/// use enedis_gap_filler::importers::parse_timestamp;
///
/// let ts = parse_timestamp("2023-01-01T02:00:00+01:00").unwrap();
/// assert_eq!(ts.to_string(), "2023-01-01 02:00:00");
/// assert!(parse_timestamp("13/13/2023 00:00:00").is_none());
/// ```
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2023-01-01 02:00:00"), Some(at(2023, 1, 1, 2, 0)));
        assert_eq!(parse_timestamp("2023-01-01T02:30:00"), Some(at(2023, 1, 1, 2, 30)));
        assert_eq!(parse_timestamp("15/07/2024 13:00:00"), Some(at(2024, 7, 15, 13, 0)));
        assert_eq!(
            parse_timestamp("2024-07-15T13:30:00+02:00"),
            Some(at(2024, 7, 15, 13, 30))
        );
        assert_eq!(
            parse_timestamp("2024-07-15 13:30:00+02:00"),
            Some(at(2024, 7, 15, 13, 30))
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2023-02-30 00:00:00"), None);
    }
}
