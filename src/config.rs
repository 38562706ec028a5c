use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::exporters::ExportFormat;
use crate::gaps::RangePolicy;
use crate::importers::CsvImporter;
use crate::series::Aggregation;
use crate::units::Unit;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Persistence is skipped when unset
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub output_dir: PathBuf,
    pub export_format: ExportFormat,
    pub range_policy: RangePolicy,
    pub input_unit: Unit,
    /// Derived from the input unit when unset
    pub aggregation: Option<Aggregation>,
    pub value_column: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 5,
            output_dir: PathBuf::from("./output"),
            export_format: ExportFormat::Template,
            range_policy: RangePolicy::ObservedRange,
            input_unit: Unit::Watt,
            aggregation: None,
            value_column: CsvImporter::DEFAULT_VALUE_COLUMN.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            export_format: parse_var("EXPORT_FORMAT")?.unwrap_or(defaults.export_format),
            range_policy: parse_var("RANGE_POLICY")?.unwrap_or(defaults.range_policy),
            input_unit: parse_var("INPUT_UNIT")?.unwrap_or(defaults.input_unit),
            aggregation: parse_var("AGGREGATION")?,
            value_column: env::var("VALUE_COLUMN").unwrap_or(defaults.value_column),
        })
    }
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                value,
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}
