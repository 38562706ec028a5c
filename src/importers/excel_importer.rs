use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::BufReader;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::importers::{parse_timestamp, RawRecord, RawSeries, RawValue, SkippedRow};
use crate::units::Unit;

#[derive(Error, Debug)]
pub enum ExcelImportError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}

/// Parser for ENEDIS hourly consumption workbooks
pub struct ExcelImporter {
    workbook_path: String,
    sheet_name: String,
}

impl ExcelImporter {
    pub const DEFAULT_SHEET: &'static str = "Consommation Horaire";

    /// First data row (0-based): one header row plus fifteen rows of account details
    const DATA_START_ROW: u32 = 16;
    const TIMESTAMP_COL: u32 = 2;
    const VALUE_COL: u32 = 4;

    pub fn new(workbook_path: impl Into<String>) -> Self {
        Self {
            workbook_path: workbook_path.into(),
            sheet_name: Self::DEFAULT_SHEET.to_string(),
        }
    }

    pub fn with_sheet(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    /// Parse the hourly consumption sheet
    ///
    /// # Expected Sheet Structure:
    /// ```text
    /// Row 1-16: Header and account details
    /// Row 17+:  column C = start time (DD/MM/YYYY HH:MM:SS), column E = consumption in kW
    /// ```
    ///
    /// Values are returned in kW; a decimal comma is left for classification.
    pub fn parse_consumption_sheet(&self) -> Result<RawSeries, ExcelImportError> {
        info!(
            "Parsing sheet '{}' of {}",
            self.sheet_name, self.workbook_path
        );

        // Open workbook (this is synchronous, caller should use spawn_blocking)
        let mut workbook: Xlsx<BufReader<File>> = match open_workbook(&self.workbook_path) {
            Ok(wb) => wb,
            Err(e) => return Err(ExcelImportError::WorkbookOpen(e.to_string())),
        };

        let range = match workbook.worksheet_range(&self.sheet_name) {
            Ok(range) => range,
            Err(_) => return Err(ExcelImportError::SheetNotFound(self.sheet_name.clone())),
        };

        // Positions below are absolute sheet coordinates, independent of where the used range starts
        let last_row = match range.end() {
            Some((row, _)) => row,
            None => {
                warn!("Sheet '{}' is empty", self.sheet_name);
                0
            }
        };
        debug!("Sheet '{}' ends at row {}", self.sheet_name, last_row);

        let mut records = Vec::new();
        let mut skipped_rows = Vec::new();

        for row_idx in Self::DATA_START_ROW..=last_row {
            let row = (row_idx - Self::DATA_START_ROW) as usize;

            let timestamp = match range.get_value((row_idx, Self::TIMESTAMP_COL)) {
                Some(Data::Empty) | None => {
                    debug!("No timestamp at row {}, skipping", row_idx);
                    continue;
                }
                Some(cell) => match cell_timestamp(cell) {
                    Some(ts) => ts,
                    None => {
                        warn!("Unreadable timestamp at row {}: {:?}", row_idx, cell);
                        skipped_rows.push(SkippedRow {
                            row,
                            reason: format!("unreadable timestamp {cell:?}"),
                        });
                        continue;
                    }
                },
            };

            let value = match range.get_value((row_idx, Self::VALUE_COL)) {
                Some(Data::Float(f)) => RawValue::Number(*f),
                Some(Data::Int(i)) => RawValue::Number(*i as f64),
                Some(Data::String(s)) if !s.trim().is_empty() => RawValue::Text(s.trim().to_string()),
                Some(Data::String(_)) | Some(Data::Empty) | None => RawValue::Empty,
                Some(other) => RawValue::Text(format!("{other:?}")),
            };

            records.push(RawRecord {
                row,
                timestamp,
                value,
            });
        }

        info!(
            "Parsed {} rows from sheet '{}' ({} skipped)",
            records.len(),
            self.sheet_name,
            skipped_rows.len()
        );

        Ok(RawSeries {
            records,
            skipped_rows,
            unit: Unit::Kilowatt,
        })
    }
}

fn cell_timestamp(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) => parse_timestamp(s),
        Data::DateTime(excel_date) => excel_date.as_datetime(),
        Data::Float(f) => excel_serial_to_datetime(*f),
        Data::Int(i) => excel_serial_to_datetime(*i as f64),
        _ => None,
    }
}

/// Convert an Excel serial day number (fractional part = time of day)
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::try_seconds(seconds)?)
}
