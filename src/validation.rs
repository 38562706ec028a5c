//! Classification of raw meter values and completeness checks on repaired series.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::importers::{RawRecord, RawValue, SkippedRow};
use crate::series::{Series, Timestamp};

/// Why a present value could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedValue {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not finite")]
    NotFinite(String),

    #[error("'{0}' is negative")]
    Negative(String),
}

/// A raw row whose value is present but unusable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedRecord {
    pub row: usize,
    pub timestamp: Timestamp,
    pub raw_value: String,
    pub reason: String,
}

/// Findings on a raw export, before repair
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub malformed: Vec<MalformedRecord>,
    /// Rows whose value cell was empty
    pub missing_values: Vec<usize>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty() && self.missing_values.is_empty() && self.skipped_rows.is_empty()
    }
}

/// Findings on a repaired series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Parse one value cell as a finite, non-negative number.
///
/// Empty text is an absent value. A decimal comma is accepted.
///
/// # Examples
///
/// ```
/// use enedis_gap_filler::validation::classify_value;
///
/// assert_eq!(classify_value("12,5").unwrap(), Some(12.5));
/// assert_eq!(classify_value("  ").unwrap(), None);
/// assert!(classify_value("12.5.3").is_err());
/// ```
pub fn classify_value(raw: &str) -> Result<Option<f64>, MalformedValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replacen(',', ".", 1)
    };

    let value: f64 = normalized
        .parse()
        .map_err(|_| MalformedValue::NotANumber(raw.to_string()))?;
    check_number(value, raw).map(Some)
}

fn check_number(value: f64, raw: &str) -> Result<f64, MalformedValue> {
    if !value.is_finite() {
        return Err(MalformedValue::NotFinite(raw.to_string()));
    }
    if value < 0.0 {
        return Err(MalformedValue::Negative(raw.to_string()));
    }
    // -0.0 reads as 0
    Ok(if value == 0.0 { 0.0 } else { value })
}

/// Classify every raw record.
///
/// Returns the usable `(timestamp, value)` samples, absent values included, and
/// the findings. Malformed records are left out of the samples.
pub fn classify_records(records: &[RawRecord]) -> (Vec<(Timestamp, Option<f64>)>, ValidationReport) {
    let mut samples = Vec::with_capacity(records.len());
    let mut report = ValidationReport::default();

    for record in records {
        let classified = match &record.value {
            RawValue::Empty => Ok(None),
            RawValue::Number(n) => check_number(*n, &n.to_string()).map(Some),
            RawValue::Text(text) => classify_value(text),
        };

        match classified {
            Ok(Some(value)) => samples.push((record.timestamp, Some(value))),
            Ok(None) => {
                report.missing_values.push(record.row);
                samples.push((record.timestamp, None));
            }
            Err(e) => {
                warn!("Row {} ({}): malformed value: {}", record.row, record.timestamp, e);
                report.malformed.push(MalformedRecord {
                    row: record.row,
                    timestamp: record.timestamp,
                    raw_value: match &record.value {
                        RawValue::Number(n) => n.to_string(),
                        RawValue::Text(text) => text.clone(),
                        RawValue::Empty => String::new(),
                    },
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        "Classified {} rows: {} malformed, {} without value",
        records.len(),
        report.malformed.len(),
        report.missing_values.len()
    );
    (samples, report)
}

/// Check a repaired series before export.
///
/// Flags remaining absent values, negative or non-finite values, and
/// timestamps that appear more than once.
pub fn validate_completed(series: &Series) -> CompletenessReport {
    let mut errors = Vec::new();

    let absent = series.absent_count();
    if absent > 0 {
        errors.push(format!("{absent} values are still missing"));
    }

    let invalid = series
        .iter()
        .filter_map(|r| r.value)
        .filter(|v| !v.is_finite() || *v < 0.0)
        .count();
    if invalid > 0 {
        errors.push(format!("{invalid} values are negative or not finite"));
    }

    let duplicates = series.duplicate_timestamps();
    if !duplicates.is_empty() {
        errors.push(format!(
            "{} timestamps appear more than once (first: {})",
            duplicates.len(),
            duplicates[0]
        ));
    }

    CompletenessReport {
        is_valid: errors.is_empty(),
        errors,
    }
}
