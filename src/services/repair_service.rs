use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::db::{ConsumptionRepository, DbError};
use crate::filler::{GapFiller, PeriodSummary};
use crate::gaps::{GapDetector, RangePolicy};
use crate::importers::RawSeries;
use crate::series::{aggregate_hourly, Aggregation, Series};
use crate::units::{to_kilowatts, Unit};
use crate::validation::{classify_records, validate_completed, CompletenessReport, ValidationReport};

/// Error types for a repair run
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("{count} hours could not be filled from neighbouring years")]
    ResidualGaps { count: usize },

    #[error("Repaired series is invalid: {}", .0.join("; "))]
    InvalidSeries(Vec<String>),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Everything a caller needs to decide whether a repaired series can be published
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub unit: Unit,
    pub raw_rows: usize,
    pub hourly_records: usize,
    pub validation: ValidationReport,
    pub periods: Vec<PeriodSummary>,
    pub completeness: CompletenessReport,
}

impl RepairReport {
    pub fn residual_gap_count(&self) -> usize {
        self.periods.iter().map(|p| p.residual_gaps.len()).sum()
    }

    pub fn filled_count(&self) -> usize {
        self.periods.iter().map(PeriodSummary::filled_hours).sum()
    }

    /// Fail when any hour stayed unfilled or the series breaks an invariant
    pub fn ensure_complete(&self) -> Result<(), RepairError> {
        let count = self.residual_gap_count();
        if count > 0 {
            return Err(RepairError::ResidualGaps { count });
        }
        if !self.completeness.is_valid {
            return Err(RepairError::InvalidSeries(self.completeness.errors.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// Repaired series in kW, one record per timestamp
    pub series: Series,
    pub report: RepairReport,
}

/// Service turning a raw export into a repaired, kW-denominated series
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairService {
    filler: GapFiller,
    /// `None` lets the unit of each export decide
    aggregation: Option<Aggregation>,
}

impl RepairService {
    pub fn new(range_policy: RangePolicy, aggregation: Aggregation) -> Self {
        Self {
            filler: GapFiller::new(GapDetector::new(range_policy)),
            aggregation: Some(aggregation),
        }
    }

    /// Aggregate sub-hour samples as their unit implies: power is averaged,
    /// energy is summed
    pub fn with_unit_aggregation(range_policy: RangePolicy) -> Self {
        Self {
            filler: GapFiller::new(GapDetector::new(range_policy)),
            aggregation: None,
        }
    }

    /// Run the repair pipeline:
    /// 1. Classify raw values (malformed rows are reported and dropped)
    /// 2. Collapse samples into hourly buckets
    /// 3. Convert to kW
    /// 4. Fill every year present from its neighbouring years
    /// 5. Check the result
    #[instrument(skip(self, raw), fields(rows = raw.records.len(), unit = %raw.unit))]
    pub fn repair(&self, raw: RawSeries) -> RepairOutcome {
        let raw_rows = raw.records.len();
        let (samples, mut validation) = classify_records(&raw.records);
        validation.skipped_rows = raw.skipped_rows;

        if !validation.malformed.is_empty() {
            warn!(
                "{} rows have malformed values and were excluded",
                validation.malformed.len()
            );
        }

        let aggregation = self
            .aggregation
            .unwrap_or_else(|| raw.unit.default_aggregation());
        debug!("Aggregating {} samples by {:?}", samples.len(), aggregation);
        let hourly = aggregate_hourly(samples, aggregation);
        let hourly_records = hourly.len();
        let in_kw = to_kilowatts(&hourly, raw.unit);

        let (series, periods) = self.filler.fill_all(&in_kw);
        let completeness = validate_completed(&series);

        let report = RepairReport {
            unit: Unit::Kilowatt,
            raw_rows,
            hourly_records,
            validation,
            periods,
            completeness,
        };

        info!(
            "Repaired {} hourly records: {} filled, {} unresolved",
            report.hourly_records,
            report.filled_count(),
            report.residual_gap_count()
        );

        RepairOutcome { series, report }
    }

    /// Replace the stored series with the repaired one
    #[instrument(skip(self, repository, outcome))]
    pub async fn publish(
        &self,
        repository: &ConsumptionRepository,
        outcome: &RepairOutcome,
    ) -> Result<usize, RepairError> {
        let stored = repository.replace_all(outcome.series.records()).await?;
        Ok(stored)
    }
}
