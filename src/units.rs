use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::series::{Aggregation, Series};

/// Unit of the values in a meter export
///
/// `W` and `kW` are average power over each step; `Wh` and `kWh` are energy
/// consumed during each step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unit {
    #[default]
    Watt,
    Kilowatt,
    WattHour,
    KilowattHour,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Watt => "W",
            Unit::Kilowatt => "kW",
            Unit::WattHour => "Wh",
            Unit::KilowattHour => "kWh",
        }
    }

    pub fn is_energy(&self) -> bool {
        matches!(self, Unit::WattHour | Unit::KilowattHour)
    }

    /// Energy steps add up to the hour; power steps average out over it
    pub fn default_aggregation(&self) -> Aggregation {
        if self.is_energy() {
            Aggregation::Sum
        } else {
            Aggregation::Mean
        }
    }

    /// Values in this unit per kilowatt (or per kWh over one hour)
    fn per_kilowatt(&self) -> f64 {
        match self {
            Unit::Watt | Unit::WattHour => 1000.0,
            Unit::Kilowatt | Unit::KilowattHour => 1.0,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown unit '{0}' (expected 'W', 'kW', 'Wh' or 'kWh')")]
pub struct ParseUnitError(pub String);

impl FromStr for Unit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "watt" => Ok(Unit::Watt),
            "kw" | "kilowatt" => Ok(Unit::Kilowatt),
            "wh" => Ok(Unit::WattHour),
            "kwh" => Ok(Unit::KilowattHour),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

/// Express every value of an hourly `series` in kilowatts
///
/// Hourly energy (Wh, kWh) equals the average power over that hour.
pub fn to_kilowatts(series: &Series, unit: Unit) -> Series {
    let divisor = unit.per_kilowatt();
    if divisor == 1.0 {
        return series.clone();
    }
    series.map_values(|v| v / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Record;
    use chrono::NaiveDate;

    #[test]
    fn test_watts_to_kilowatts() {
        let ts = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let series: Series = vec![Record::original(ts, Some(1250.0))].into();

        assert_eq!(to_kilowatts(&series, Unit::Watt).records()[0].value, Some(1.25));
        assert_eq!(to_kilowatts(&series, Unit::Kilowatt), series);
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("kW".parse::<Unit>(), Ok(Unit::Kilowatt));
        assert_eq!("W".parse::<Unit>(), Ok(Unit::Watt));
        assert_eq!("Wh".parse::<Unit>(), Ok(Unit::WattHour));
        assert_eq!("kwh".parse::<Unit>(), Ok(Unit::KilowattHour));
        assert!("MW".parse::<Unit>().is_err());
    }

    #[test]
    fn test_default_aggregation_follows_quantity() {
        assert_eq!(Unit::Watt.default_aggregation(), Aggregation::Mean);
        assert_eq!(Unit::Kilowatt.default_aggregation(), Aggregation::Mean);
        assert_eq!(Unit::WattHour.default_aggregation(), Aggregation::Sum);
        assert_eq!(Unit::KilowattHour.default_aggregation(), Aggregation::Sum);
    }

    #[test]
    fn test_unit_serializes_as_symbol() {
        assert_eq!(serde_json::to_value(Unit::Kilowatt).unwrap(), "kW");
        assert_eq!(serde_json::to_value(Unit::WattHour).unwrap(), "Wh");
    }
}
