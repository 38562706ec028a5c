// Tests for the per-year load-profile workbooks and CSV files

mod common;

use calamine::{open_workbook, Data, Reader, Xlsx};
use common::{at, series};
use enedis_gap_filler::exporters::{export_all, validate_export_format, write_template, ExportFormat};
use enedis_gap_filler::series::{Record, Series};
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::BufReader;
use tempfile::TempDir;

fn repaired_day() -> Series {
    (0..24)
        .map(|h| {
            let record = Record::original(at(2023, 1, 1, h), Some(0.5 + h as f64 / 100.0));
            if h == 3 {
                Record::borrowed(at(2023, 1, 1, h), 0.1234567, 2024)
            } else {
                record
            }
        })
        .collect()
}

#[test]
fn test_written_template_passes_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("2023.xlsx");

    write_template(&repaired_day(), &path).expect("Failed to write template");

    let errors = validate_export_format(&path);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn test_written_template_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("2023.xlsx");
    write_template(&repaired_day(), &path).unwrap();

    let mut workbook: Xlsx<BufReader<File>> = open_workbook(&path).unwrap();
    let range = workbook.worksheet_range("Sheet1").unwrap();

    assert_eq!(range.get((1, 0)), Some(&Data::String("Time Interval".to_string())));
    assert_eq!(range.get((1, 1)), Some(&Data::String("60".to_string())));
    assert_eq!(range.get((2, 1)), Some(&Data::String("kW".to_string())));
    assert_eq!(range.get((4, 0)), Some(&Data::String("1/1 0:00".to_string())));
    assert_eq!(range.get((4, 1)), Some(&Data::Float(0.5)));
    assert_eq!(range.get((7, 0)), Some(&Data::String("1/1 3:00".to_string())));
    // rounded to six decimals
    assert_eq!(range.get((7, 1)), Some(&Data::Float(0.123457)));
    assert_eq!(range.get_size().0, 4 + 24);
}

#[test]
fn test_blank_values_are_flagged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("2023.xlsx");
    let series = series(&[
        (at(2023, 1, 1, 0), Some(1.0)),
        (at(2023, 1, 1, 1), None),
        (at(2023, 1, 1, 2), None),
    ]);

    write_template(&series, &path).unwrap();

    let errors = validate_export_format(&path);
    assert_eq!(errors, vec!["2 load power cells are empty (first at row 6)".to_string()]);
}

#[test]
fn test_foreign_workbook_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("other.xlsx");

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "Time Interval").unwrap();
    worksheet.write_string(0, 1, "60").unwrap();
    worksheet.write_string(1, 0, "Unit").unwrap();
    worksheet.write_string(1, 1, "W").unwrap();
    workbook.save(&path).unwrap();

    let errors = validate_export_format(&path);
    assert!(errors.contains(&"Missing required element: Month/Day Hour:Minute".to_string()));
    assert!(errors.contains(&"Unit should be kW".to_string()));
    assert!(!errors.iter().any(|e| e.starts_with("Time Interval")));
}

#[test]
fn test_unreadable_file_fails_validation() {
    let errors = validate_export_format(std::path::Path::new("/nonexistent/2023.xlsx"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Error validating file"));
}

#[test]
fn test_export_all_writes_one_set_per_year() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("output");
    let series = series(&[
        (at(2023, 1, 1, 0), Some(1.0)),
        (at(2024, 1, 1, 0), Some(2.0)),
        (at(2025, 1, 1, 0), Some(3.0)),
    ]);

    let written = export_all(&series, &out, ExportFormat::Both).unwrap();

    assert_eq!(written.len(), 6);
    for year in [2023, 2024, 2025] {
        assert!(out.join(format!("{year}.xlsx")).exists());
        assert!(out.join(format!("{year}.csv")).exists());
    }

    let csv = std::fs::read_to_string(out.join("2024.csv")).unwrap();
    assert_eq!(csv, "Horodate;Valeur;Source\n2024-01-01 00:00:00;2.0;original\n");
}

#[test]
fn test_export_csv_only() {
    let dir = TempDir::new().unwrap();
    let series = series(&[(at(2023, 1, 1, 0), Some(1.0))]);

    let written = export_all(&series, dir.path(), ExportFormat::Csv).unwrap();

    assert_eq!(written.len(), 1);
    assert_eq!(written[0].period, 2023);
    assert!(!dir.path().join("2023.xlsx").exists());
}
