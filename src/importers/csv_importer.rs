use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::importers::{parse_timestamp, RawRecord, RawSeries, RawValue, SkippedRow};
use crate::units::Unit;

#[derive(Error, Debug)]
pub enum CsvImportError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Reader for semicolon-delimited ENEDIS load curves
///
/// # Expected layout:
/// ```text
/// Horodate;Valeur
/// 2023-01-01T00:00:00+01:00;512
/// 2023-01-01T00:30:00+01:00;498
/// ```
pub struct CsvImporter {
    path: PathBuf,
    timestamp_column: String,
    value_column: String,
    unit: Unit,
}

impl CsvImporter {
    pub const DEFAULT_TIMESTAMP_COLUMN: &'static str = "Horodate";
    pub const DEFAULT_VALUE_COLUMN: &'static str = "Valeur";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timestamp_column: Self::DEFAULT_TIMESTAMP_COLUMN.to_string(),
            value_column: Self::DEFAULT_VALUE_COLUMN.to_string(),
            unit: Unit::Watt,
        }
    }

    /// Read values from another column, e.g. `Consommation (Wh)`
    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = column.into();
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Required columns absent from `headers`, in declaration order
    pub fn validate_columns(&self, headers: &StringRecord) -> Vec<String> {
        [&self.timestamp_column, &self.value_column]
            .into_iter()
            .filter(|required| !headers.iter().any(|h| h == required.as_str()))
            .cloned()
            .collect()
    }

    /// Read the whole file (synchronous, caller should use spawn_blocking)
    pub fn read(&self) -> Result<RawSeries, CsvImportError> {
        info!("Reading CSV file: {}", self.path.display());
        let file = File::open(&self.path).map_err(|source| CsvImportError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.read_from(file)
    }

    pub fn read_from<R: Read>(&self, input: R) -> Result<RawSeries, CsvImportError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);

        // Non-UTF-8 header cells (Latin-1 exports) are decoded lossily
        let headers = StringRecord::from_byte_record_lossy(reader.byte_headers()?.clone());
        let missing = self.validate_columns(&headers);
        if !missing.is_empty() {
            return Err(CsvImportError::MissingColumns(missing));
        }

        // validate_columns guarantees both positions exist
        let ts_idx = column_index(&headers, &self.timestamp_column).unwrap_or_default();
        let value_idx = column_index(&headers, &self.value_column).unwrap_or_default();

        let mut records = Vec::new();
        let mut skipped_rows = Vec::new();

        for (row, result) in reader.byte_records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!("Row {}: unreadable record ({}), skipping", row, e);
                    skipped_rows.push(SkippedRow {
                        row,
                        reason: format!("unreadable record: {e}"),
                    });
                    continue;
                }
            };
            let raw_ts = field_text(&record, ts_idx);

            let Some(timestamp) = parse_timestamp(&raw_ts) else {
                warn!("Row {}: unreadable timestamp '{}', skipping", row, raw_ts);
                skipped_rows.push(SkippedRow {
                    row,
                    reason: format!("unreadable timestamp '{raw_ts}'"),
                });
                continue;
            };

            // A value in another encoding stays text and is reported as malformed
            let value = match field_text(&record, value_idx) {
                text if !text.is_empty() => RawValue::Text(text),
                _ => RawValue::Empty,
            };

            records.push(RawRecord {
                row,
                timestamp,
                value,
            });
        }

        debug!(
            "Read {} rows ({} skipped) from {}",
            records.len(),
            skipped_rows.len(),
            self.path.display()
        );

        Ok(RawSeries {
            records,
            skipped_rows,
            unit: self.unit,
        })
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn field_text(record: &ByteRecord, idx: usize) -> String {
    record
        .get(idx)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}
