//! Cross-year substitution of missing hourly values.
//!
//! A missing hour is filled with the value recorded at the same month, day and
//! hour of the following year, or of the preceding year when the following
//! year has nothing. Substitutes always come from the input series, never from
//! previously synthesized records.

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, instrument};

use crate::gaps::GapDetector;
use crate::series::{Period, Record, Series, Source, Timestamp};

/// Timestamp lookup over the values present in a series.
///
/// When the same timestamp appears more than once, the first record carrying a
/// value wins.
#[derive(Debug, Clone, Default)]
pub struct SeriesIndex {
    values: HashMap<Timestamp, f64>,
}

impl SeriesIndex {
    pub fn new(series: &Series) -> Self {
        let mut values = HashMap::with_capacity(series.len());
        for record in series {
            if let Some(value) = record.value {
                values.entry(record.timestamp).or_insert(value);
            }
        }
        Self { values }
    }

    pub fn value_at(&self, timestamp: Timestamp) -> Option<f64> {
        self.values.get(&timestamp).copied()
    }
}

/// A substitute value and the year it was borrowed from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Replacement {
    pub value: f64,
    pub source_year: i32,
}

/// Outcome of filling one period
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub range_start: Option<NaiveDateTime>,
    pub range_end: Option<NaiveDateTime>,
    pub missing_hours: usize,
    /// Filled hours keyed by the year their value came from
    pub filled_by_source: BTreeMap<i32, usize>,
    /// Missing hours for which neither neighbouring year had a value
    pub residual_gaps: Vec<Timestamp>,
}

impl PeriodSummary {
    pub fn filled_hours(&self) -> usize {
        self.filled_by_source.values().sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GapFiller {
    detector: GapDetector,
}

impl GapFiller {
    pub fn new(detector: GapDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &GapDetector {
        &self.detector
    }

    /// Find a substitute for `missing`: next year first, then previous year.
    ///
    /// A Feb 29 timestamp has no counterpart in a non-leap neighbour; that
    /// candidate is skipped.
    pub fn resolve_one(&self, index: &SeriesIndex, missing: Timestamp) -> Option<Replacement> {
        let year = missing.year();
        [year + 1, year - 1].into_iter().find_map(|candidate_year| {
            let Some(candidate) = missing.with_year(candidate_year) else {
                debug!(
                    "{} has no counterpart in {}, trying next candidate",
                    missing, candidate_year
                );
                return None;
            };
            index.value_at(candidate).map(|value| Replacement {
                value,
                source_year: candidate_year,
            })
        })
    }

    /// Repair one period of `series`, returning a new sorted series.
    ///
    /// Records outside `period` pass through untouched. Duplicate timestamps
    /// already in the input are not merged here; see [`GapFiller::fill_all`].
    pub fn fill(&self, series: &Series, period: Period) -> Series {
        let index = SeriesIndex::new(series);
        let (synthesized, _) = self.synthesize_period(series, &index, period);
        merge_synthesized(series, synthesized, false)
    }

    /// Same as [`GapFiller::fill`], also reporting what was filled
    pub fn fill_with_summary(&self, series: &Series, period: Period) -> (Series, PeriodSummary) {
        let index = SeriesIndex::new(series);
        let (synthesized, summary) = self.synthesize_period(series, &index, period);
        (merge_synthesized(series, synthesized, false), summary)
    }

    /// Repair every period present in `series` and merge the result into one
    /// series with a single record per timestamp.
    ///
    /// For records sharing a timestamp, one with a value beats one without and
    /// an original beats a synthesized one; remaining ties keep input order.
    #[instrument(skip(self, series), fields(records = series.len()))]
    pub fn fill_all(&self, series: &Series) -> (Series, Vec<PeriodSummary>) {
        let index = SeriesIndex::new(series);
        let mut synthesized = Vec::new();
        let mut summaries = Vec::new();

        for period in series.periods() {
            let (mut records, summary) = self.synthesize_period(series, &index, period);
            info!(
                "Period {}: {} missing, {} filled, {} unresolved",
                period,
                summary.missing_hours,
                summary.filled_hours(),
                summary.residual_gaps.len()
            );
            synthesized.append(&mut records);
            summaries.push(summary);
        }

        (merge_synthesized(series, synthesized, true), summaries)
    }

    fn synthesize_period(
        &self,
        series: &Series,
        index: &SeriesIndex,
        period: Period,
    ) -> (Vec<Record>, PeriodSummary) {
        let range = self.detector.expected_range(series, period);
        let missing = self.detector.detect(series, period);

        let mut synthesized = Vec::new();
        let mut filled_by_source: BTreeMap<i32, usize> = BTreeMap::new();
        let mut residual_gaps = Vec::new();

        for timestamp in &missing {
            match self.resolve_one(index, *timestamp) {
                Some(replacement) => {
                    *filled_by_source.entry(replacement.source_year).or_default() += 1;
                    synthesized.push(Record::borrowed(
                        *timestamp,
                        replacement.value,
                        replacement.source_year,
                    ));
                }
                None => residual_gaps.push(*timestamp),
            }
        }

        let summary = PeriodSummary {
            period,
            range_start: range.map(|(start, _)| start),
            range_end: range.map(|(_, end)| end),
            missing_hours: missing.len(),
            filled_by_source,
            residual_gaps,
        };
        (synthesized, summary)
    }
}

/// Append synthesized records to a copy of `series` and sort.
///
/// Raw records without a value are dropped where a synthesized record now
/// covers their timestamp. With `dedup`, one record per timestamp is kept.
fn merge_synthesized(series: &Series, synthesized: Vec<Record>, dedup: bool) -> Series {
    let covered: HashSet<Timestamp> = synthesized.iter().map(|r| r.timestamp).collect();

    let merged: Series = series
        .iter()
        .filter(|r| !(r.value.is_none() && covered.contains(&r.timestamp)))
        .cloned()
        .chain(synthesized)
        .collect::<Series>()
        .sorted();

    if !dedup {
        return merged;
    }

    let mut kept: Vec<Record> = Vec::with_capacity(merged.len());
    for record in merged.into_records() {
        match kept.last_mut() {
            Some(last) if last.timestamp == record.timestamp => {
                if precedence(&record) > precedence(last) {
                    *last = record;
                }
            }
            _ => kept.push(record),
        }
    }
    Series::new(kept)
}

fn precedence(record: &Record) -> (bool, bool) {
    (record.value.is_some(), record.source == Source::Original)
}
