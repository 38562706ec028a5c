//! Load-profile workbook in the layout expected by the solar sizing template.
//!
//! ```text
//! A                        | B
//! Note                     | <instructions>
//! Time Interval            | 60
//! Unit                     | kW
//! Month/Day Hour:Minute    | Load Power
//! 1/1 0:00                 | 0.512
//! 1/1 1:00                 | 0.498
//! ...
//! ```

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{Datelike, Timelike};
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::exporters::ExportError;
use crate::series::{Series, Timestamp};

const SHEET_NAME: &str = "Sheet1";
const TIME_INTERVAL: &str = "60";
const UNIT: &str = "kW";
const DATE_HEADER: &str = "Month/Day Hour:Minute";
const HEADER_ROWS: usize = 4;

const TEMPLATE_NOTE: &str = "Note:
1. Do not delete this note or change the format, date & time column, or time interval in the template. Enter the load power for each time segment in each date. Do not leave any cell empty.
2. The template contains all data from 0:00 on January 1 to the end of the year.
3. Enter the unit of the load power (kW or W) in cell B3.
4. Column A refers to \"Month/Day Hour:Minute\".
5. Enter the load power at 0:00 on January 1 in cell B5, at 1:00 in cell B6, and so on.
6. Each value must be greater than or equal to 0 (max 6 decimals for kW, 2 for W).";

/// Row label for a timestamp, e.g. `7/14 9:00`
pub fn format_date_hour(timestamp: Timestamp) -> String {
    format!(
        "{}/{} {}:00",
        timestamp.month(),
        timestamp.day(),
        timestamp.hour()
    )
}

fn round_kw(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Write `series` (values in kW) as a load-profile workbook
pub fn write_template(series: &Series, path: &Path) -> Result<(), ExportError> {
    info!("Writing load profile {} ({} rows)", path.display(), series.len());

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    worksheet.write_string(0, 0, "Note")?;
    worksheet.write_string(0, 1, TEMPLATE_NOTE)?;
    worksheet.write_string(1, 0, "Time Interval")?;
    worksheet.write_string(1, 1, TIME_INTERVAL)?;
    worksheet.write_string(2, 0, "Unit")?;
    worksheet.write_string(2, 1, UNIT)?;
    worksheet.write_string(3, 0, DATE_HEADER)?;
    worksheet.write_string(3, 1, "Load Power")?;

    let mut blanks = 0;
    for (i, record) in series.iter().enumerate() {
        let row =
            u32::try_from(HEADER_ROWS + i).map_err(|_| ExportError::TooManyRows(series.len()))?;
        worksheet.write_string(row, 0, format_date_hour(record.timestamp))?;
        match record.value {
            Some(value) => {
                worksheet.write_number(row, 1, round_kw(value))?;
            }
            None => blanks += 1,
        }
    }

    if blanks > 0 {
        warn!(
            "{} rows of {} have no value and were left empty",
            blanks,
            path.display()
        );
    }

    worksheet.set_column_width(0, 25)?;
    worksheet.set_column_width(1, 15)?;

    workbook.save(path)?;
    Ok(())
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) if f.fract() == 0.0 => format!("{f:.0}"),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Empty) | None => String::new(),
        Some(other) => format!("{other:?}"),
    }
}

/// Re-read a generated workbook and list every way it departs from the template
pub fn validate_export_format(path: &Path) -> Vec<String> {
    let mut errors = Vec::new();

    let mut workbook: Xlsx<BufReader<File>> = match open_workbook(path) {
        Ok(wb) => wb,
        Err(e) => {
            errors.push(format!("Error validating file: {e}"));
            return errors;
        }
    };

    let range = match workbook.worksheet_range(SHEET_NAME) {
        Ok(range) => range,
        Err(e) => {
            errors.push(format!("Error validating file: {e}"));
            return errors;
        }
    };

    let (row_count, _) = range.get_size();
    let labels: Vec<String> = (0..row_count).map(|r| cell_text(range.get((r, 0)))).collect();
    let values: Vec<String> = (0..row_count).map(|r| cell_text(range.get((r, 1)))).collect();

    for element in ["Time Interval", "Unit", DATE_HEADER] {
        if !labels.iter().any(|label| label.contains(element)) {
            errors.push(format!("Missing required element: {element}"));
        }
    }

    if !values.iter().any(|v| v == TIME_INTERVAL) {
        errors.push(format!("Time Interval should be {TIME_INTERVAL}"));
    }
    if !values.iter().any(|v| v == UNIT) {
        errors.push(format!("Unit should be {UNIT}"));
    }

    let empty_rows: Vec<usize> = (HEADER_ROWS..row_count)
        .filter(|r| !labels[*r].is_empty() && values[*r].is_empty())
        .map(|r| r + 1)
        .collect();
    if let Some(first) = empty_rows.first() {
        errors.push(format!(
            "{} load power cells are empty (first at row {})",
            empty_rows.len(),
            first
        ));
    }

    debug!("Validated {}: {} errors", path.display(), errors.len());
    errors
}
