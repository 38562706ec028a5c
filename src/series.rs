use chrono::{Datelike, Duration, DurationRound, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hour-granular wall-clock instant as exported by the meter
pub type Timestamp = NaiveDateTime;

/// A reporting period: one calendar year
pub type Period = i32;

/// Provenance of a record's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Value present in the raw meter export
    Original,
    /// Value borrowed from the same hour in the given year
    Borrowed(i32),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Original => f.write_str("original"),
            Source::Borrowed(year) => write!(f, "{year:04}"),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid source tag: {0}")]
pub struct ParseSourceError(pub String);

impl FromStr for Source {
    type Err = ParseSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("original") {
            return Ok(Source::Original);
        }
        if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(year) = trimmed.parse::<i32>() {
                return Ok(Source::Borrowed(year));
            }
        }
        Err(ParseSourceError(s.to_string()))
    }
}

/// One hourly bucket of the series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: Timestamp,
    pub value: Option<f64>,
    pub source: Source,
}

impl Record {
    pub fn original(timestamp: Timestamp, value: Option<f64>) -> Self {
        Self {
            timestamp,
            value,
            source: Source::Original,
        }
    }

    pub fn borrowed(timestamp: Timestamp, value: f64, source_year: i32) -> Self {
        Self {
            timestamp,
            value: Some(value),
            source: Source::Borrowed(source_year),
        }
    }

    pub fn period(&self) -> Period {
        self.timestamp.year()
    }
}

/// Ordered collection of hourly records.
///
/// Every transform returns a new `Series`; nothing here mutates a series
/// that is shared with a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    records: Vec<Record>,
}

impl Series {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Records whose timestamp falls in `period`, in series order
    pub fn in_period(&self, period: Period) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().filter(move |r| r.period() == period)
    }

    pub fn restricted_to(&self, period: Period) -> Series {
        self.in_period(period).cloned().collect()
    }

    /// Calendar years actually present in the data, ascending
    pub fn periods(&self) -> BTreeSet<Period> {
        self.records.iter().map(Record::period).collect()
    }

    /// Stable sort by timestamp; records sharing a timestamp keep their relative order
    pub fn sorted(mut self) -> Series {
        self.records.sort_by_key(|r| r.timestamp);
        self
    }

    pub fn is_sorted(&self) -> bool {
        self.records
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    }

    pub fn absent_count(&self) -> usize {
        self.records.iter().filter(|r| r.value.is_none()).count()
    }

    pub fn duplicate_timestamps(&self) -> Vec<Timestamp> {
        let mut seen = HashSet::new();
        let mut duplicates = BTreeSet::new();
        for record in &self.records {
            if !seen.insert(record.timestamp) {
                duplicates.insert(record.timestamp);
            }
        }
        duplicates.into_iter().collect()
    }

    /// Apply `f` to every present value, keeping timestamps and provenance
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Series {
        self.records
            .iter()
            .map(|r| Record {
                timestamp: r.timestamp,
                value: r.value.map(&f),
                source: r.source,
            })
            .collect()
    }

    /// Group records by calendar year; years without records are not present
    pub fn partition_by_period(&self) -> BTreeMap<Period, Series> {
        let mut by_period: BTreeMap<Period, Vec<Record>> = BTreeMap::new();
        for record in &self.records {
            by_period
                .entry(record.period())
                .or_default()
                .push(record.clone());
        }
        by_period
            .into_iter()
            .map(|(period, records)| (period, Series::new(records)))
            .collect()
    }
}

impl FromIterator<Record> for Series {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Record>> for Series {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// How sub-hour samples collapse into one hourly bucket
///
/// When none is chosen, the input unit decides (see `Unit::default_aggregation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Energy readings: the hour is the total of its samples
    Sum,
    /// Power readings: the hour is the average of its samples
    Mean,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown aggregation '{0}' (expected 'sum' or 'mean')")]
pub struct ParseAggregationError(pub String);

impl FromStr for Aggregation {
    type Err = ParseAggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            _ => Err(ParseAggregationError(s.to_string())),
        }
    }
}

pub fn floor_to_hour(ts: Timestamp) -> Timestamp {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

/// Collapse raw samples into one original record per hour.
///
/// Exact duplicate samples (same instant, same value) are counted once. An
/// hour is absent only when every sample in it is absent.
pub fn aggregate_hourly(
    samples: impl IntoIterator<Item = (Timestamp, Option<f64>)>,
    aggregation: Aggregation,
) -> Series {
    #[derive(Default)]
    struct Bucket {
        total: f64,
        present: usize,
    }

    let mut seen: HashSet<(Timestamp, Option<u64>)> = HashSet::new();
    let mut buckets: BTreeMap<Timestamp, Bucket> = BTreeMap::new();

    for (timestamp, value) in samples {
        if !seen.insert((timestamp, value.map(f64::to_bits))) {
            continue;
        }
        let bucket = buckets.entry(floor_to_hour(timestamp)).or_default();
        if let Some(v) = value {
            bucket.total += v;
            bucket.present += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(hour, bucket)| {
            let value = match (bucket.present, aggregation) {
                (0, _) => None,
                (_, Aggregation::Sum) => Some(bucket.total),
                (n, Aggregation::Mean) => Some(bucket.total / n as f64),
            };
            Record::original(hour, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_source_display_and_parse() {
        assert_eq!(Source::Original.to_string(), "original");
        assert_eq!(Source::Borrowed(2024).to_string(), "2024");
        assert_eq!("original".parse::<Source>().unwrap(), Source::Original);
        assert_eq!("2023".parse::<Source>().unwrap(), Source::Borrowed(2023));
        assert!("23".parse::<Source>().is_err());
        assert!("next".parse::<Source>().is_err());
    }

    #[test]
    fn test_source_serializes_as_string() {
        let record = Record::borrowed(at(2023, 1, 1, 2, 0), 0.7, 2024);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "2024");
    }

    #[test]
    fn test_partition_by_period_omits_empty_years() {
        let series: Series = vec![
            Record::original(at(2021, 6, 1, 0, 0), Some(1.0)),
            Record::original(at(2023, 1, 1, 0, 0), Some(2.0)),
            Record::original(at(2023, 1, 1, 1, 0), None),
        ]
        .into();

        let parts = series.partition_by_period();
        assert_eq!(parts.keys().copied().collect::<Vec<_>>(), vec![2021, 2023]);
        assert_eq!(parts[&2023].len(), 2);
        assert!(!parts.contains_key(&2022));
    }

    #[test]
    fn test_floor_to_hour() {
        assert_eq!(floor_to_hour(at(2023, 3, 4, 5, 30)), at(2023, 3, 4, 5, 0));
        assert_eq!(floor_to_hour(at(2023, 3, 4, 5, 0)), at(2023, 3, 4, 5, 0));
    }

    #[test]
    fn test_aggregate_hourly_sum_and_mean() {
        let samples = vec![
            (at(2023, 1, 1, 0, 0), Some(100.0)),
            (at(2023, 1, 1, 0, 30), Some(300.0)),
            (at(2023, 1, 1, 1, 0), None),
            (at(2023, 1, 1, 1, 30), Some(50.0)),
            (at(2023, 1, 1, 2, 0), None),
        ];

        let summed = aggregate_hourly(samples.clone(), Aggregation::Sum);
        let values: Vec<_> = summed.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![Some(400.0), Some(50.0), None]);

        let averaged = aggregate_hourly(samples, Aggregation::Mean);
        assert_eq!(averaged.records()[0].value, Some(200.0));
        assert!(averaged.is_sorted());
    }

    #[test]
    fn test_aggregate_hourly_drops_exact_duplicates() {
        let samples = vec![
            (at(2023, 1, 1, 0, 0), Some(10.0)),
            (at(2023, 1, 1, 0, 0), Some(10.0)),
            (at(2023, 1, 1, 0, 30), Some(10.0)),
        ];
        let series = aggregate_hourly(samples, Aggregation::Sum);
        assert_eq!(series.len(), 1);
        assert_eq!(series.records()[0].value, Some(20.0));
    }

    #[test]
    fn test_map_values_keeps_absent() {
        let series: Series = vec![
            Record::original(at(2023, 1, 1, 0, 0), Some(1500.0)),
            Record::original(at(2023, 1, 1, 1, 0), None),
        ]
        .into();
        let scaled = series.map_values(|v| v / 1000.0);
        assert_eq!(scaled.records()[0].value, Some(1.5));
        assert_eq!(scaled.records()[1].value, None);
        assert_eq!(series.records()[0].value, Some(1500.0));
    }
}
