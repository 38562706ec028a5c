use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::exporters::ExportError;
use crate::series::Series;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct CsvRow {
    #[serde(rename = "Horodate")]
    horodate: String,
    #[serde(rename = "Valeur")]
    valeur: Option<f64>,
    #[serde(rename = "Source")]
    source: String,
}

/// Write `series` as `Horodate;Valeur;Source` rows; absent values stay empty
pub fn write_series<W: Write>(series: &Series, output: W) -> Result<(), ExportError> {
    let mut writer = WriterBuilder::new().delimiter(b';').from_writer(output);

    for record in series {
        writer.serialize(CsvRow {
            horodate: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            valeur: record.value,
            source: record.source.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_csv(series: &Series, path: &Path) -> Result<(), ExportError> {
    info!("Writing {} ({} rows)", path.display(), series.len());
    let file = std::fs::File::create(path)?;
    write_series(series, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Record;
    use chrono::NaiveDate;

    #[test]
    fn test_write_series_layout() {
        let at = |h| {
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let series: Series = vec![
            Record::original(at(0), Some(0.5)),
            Record::borrowed(at(1), 0.7, 2024),
            Record::original(at(2), None),
        ]
        .into();

        let mut buffer = Vec::new();
        write_series(&series, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "Horodate;Valeur;Source\n\
             2023-01-01 00:00:00;0.5;original\n\
             2023-01-01 01:00:00;0.7;2024\n\
             2023-01-01 02:00:00;;original\n"
        );
    }
}
