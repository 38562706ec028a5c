#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use enedis_gap_filler::series::{Record, Series};
use sqlx::PgPool;

/// Timestamp on the hour
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn series(records: &[(NaiveDateTime, Option<f64>)]) -> Series {
    records
        .iter()
        .map(|(ts, value)| Record::original(*ts, *value))
        .collect()
}

/// Connect to the test database, or `None` when DATABASE_URL is not set
pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        println!("Note: Test skipped (DATABASE_URL not set)");
        return None;
    };

    let pool = enedis_gap_filler::db::connect(&database_url, 5)
        .await
        .expect("Failed to connect to test database");
    Some(pool)
}
