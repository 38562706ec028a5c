//! Detection of expected-but-missing hourly samples within one period.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::series::{Period, Series, Timestamp};

/// Which hours a period is expected to contain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangePolicy {
    /// From the first to the last timestamp observed in the period
    #[default]
    ObservedRange,
    /// Jan 1 00:00 through Dec 31 23:00, whenever the period has any record
    CalendarYear,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown range policy '{0}' (expected 'observed' or 'calendar')")]
pub struct ParseRangePolicyError(pub String);

impl FromStr for RangePolicy {
    type Err = ParseRangePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observed" | "observed-range" => Ok(RangePolicy::ObservedRange),
            "calendar" | "calendar-year" => Ok(RangePolicy::CalendarYear),
            _ => Err(ParseRangePolicyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GapDetector {
    policy: RangePolicy,
}

impl GapDetector {
    pub fn new(policy: RangePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    /// Inclusive bounds of the hours `period` should contain, or `None` if
    /// the series has no record in that period.
    pub fn expected_range(&self, series: &Series, period: Period) -> Option<(Timestamp, Timestamp)> {
        let observed = series
            .in_period(period)
            .map(|r| r.timestamp)
            .fold(None, |acc: Option<(Timestamp, Timestamp)>, ts| match acc {
                None => Some((ts, ts)),
                Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
            })?;

        match self.policy {
            RangePolicy::ObservedRange => Some(observed),
            RangePolicy::CalendarYear => calendar_bounds(period),
        }
    }

    /// Every expected hour of `period` with no record carrying a value, ascending.
    ///
    /// A record whose value is absent still bounds the observed range but does
    /// not count as present.
    pub fn detect(&self, series: &Series, period: Period) -> Vec<Timestamp> {
        let Some((start, end)) = self.expected_range(series, period) else {
            debug!("No records for period {}, nothing to detect", period);
            return Vec::new();
        };

        let present: HashSet<Timestamp> = series
            .in_period(period)
            .filter(|r| r.value.is_some())
            .map(|r| r.timestamp)
            .collect();

        let missing: Vec<Timestamp> = hourly_range(start, end)
            .filter(|ts| !present.contains(ts))
            .collect();

        debug!(
            "Period {}: {} missing hours between {} and {}",
            period,
            missing.len(),
            start,
            end
        );
        missing
    }
}

/// Hourly steps from `start` to `end`, both inclusive
pub fn hourly_range(start: Timestamp, end: Timestamp) -> impl Iterator<Item = Timestamp> {
    std::iter::successors(Some(start), |ts| ts.checked_add_signed(Duration::hours(1)))
        .take_while(move |ts| *ts <= end)
}

fn calendar_bounds(period: Period) -> Option<(Timestamp, Timestamp)> {
    let start = NaiveDate::from_ymd_opt(period, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(period, 12, 31)?.and_hms_opt(23, 0, 0)?;
    Some((start, end))
}
