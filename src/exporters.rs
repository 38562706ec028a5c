//! Report-ready outputs, one file per calendar year

pub mod template;
pub mod yearly_csv;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::series::{Period, Series};

pub use template::{format_date_hour, validate_export_format, write_template};
pub use yearly_csv::write_csv;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Series has {0} rows, more than a worksheet can hold")]
    TooManyRows(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// `{year}.xlsx` load-profile workbooks
    #[default]
    Template,
    /// `{year}.csv` semicolon files with provenance
    Csv,
    Both,
}

impl ExportFormat {
    fn writes_template(&self) -> bool {
        matches!(self, ExportFormat::Template | ExportFormat::Both)
    }

    fn writes_csv(&self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Both)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown export format '{0}' (expected 'template', 'csv' or 'both')")]
pub struct ParseExportFormatError(pub String);

impl FromStr for ExportFormat {
    type Err = ParseExportFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" | "xlsx" => Ok(ExportFormat::Template),
            "csv" => Ok(ExportFormat::Csv),
            "both" => Ok(ExportFormat::Both),
            _ => Err(ParseExportFormatError(s.to_string())),
        }
    }
}

/// A file written for one period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub period: Period,
    pub path: PathBuf,
}

/// Write one `period` of `series` in every requested format
pub fn export_period(
    series: &Series,
    period: Period,
    output_dir: &Path,
    format: ExportFormat,
) -> Result<Vec<ExportedFile>, ExportError> {
    let year_series = series.restricted_to(period);
    let mut written = Vec::new();

    if format.writes_template() {
        let path = output_dir.join(format!("{period}.xlsx"));
        write_template(&year_series, &path)?;
        written.push(ExportedFile { period, path });
    }
    if format.writes_csv() {
        let path = output_dir.join(format!("{period}.csv"));
        write_csv(&year_series, &path)?;
        written.push(ExportedFile { period, path });
    }

    debug!("Exported period {} to {} files", period, written.len());
    Ok(written)
}

/// Write every period present in `series`
pub fn export_all(
    series: &Series,
    output_dir: &Path,
    format: ExportFormat,
) -> Result<Vec<ExportedFile>, ExportError> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for period in series.periods() {
        written.extend(export_period(series, period, output_dir, format)?);
    }
    Ok(written)
}
