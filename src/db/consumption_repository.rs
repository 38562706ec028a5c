use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::db::{ConsumptionRow, DbError};
use crate::series::{Period, Record};

/// Store for repaired hourly consumption.
///
/// The pool is supplied by the caller; the repository holds no global state.
#[derive(Clone)]
pub struct ConsumptionRepository {
    pool: PgPool,
}

impl ConsumptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the stored series with `records` in one transaction.
    ///
    /// Existing rows are deleted first. Records without a value are skipped and
    /// a repeated timestamp keeps its first record.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn replace_all(&self, records: &[Record]) -> Result<usize, DbError> {
        debug!("Beginning transaction to replace {} records", records.len());
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM consumption_records")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut inserted = 0;
        let mut duplicates = 0;
        let mut skipped = 0;

        for record in records {
            let Some(value) = record.value else {
                skipped += 1;
                continue;
            };

            let result = sqlx::query(
                r#"
                INSERT INTO consumption_records (recorded_at, value_kw, source)
                VALUES ($1, $2, $3)
                ON CONFLICT (recorded_at) DO NOTHING
                "#,
            )
            .bind(record.timestamp)
            .bind(value)
            .bind(record.source.to_string())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            } else {
                duplicates += 1;
            }
        }

        tx.commit().await?;

        if skipped > 0 {
            warn!("Skipped {} records without a value", skipped);
        }
        info!(
            "Replaced {} stored records with {} new ones, {} duplicates skipped",
            deleted, inserted, duplicates
        );
        Ok(inserted)
    }

    /// Stored records of one calendar year, ascending
    #[instrument(skip(self))]
    pub async fn find_by_year(&self, year: Period) -> Result<Vec<Record>, DbError> {
        let (Some(start), Some(end)) = (year_start(year), year_start(year + 1)) else {
            return Ok(Vec::new());
        };
        debug!("Querying records from {} to {}", start, end);

        let rows = sqlx::query_as::<_, ConsumptionRow>(
            r#"
            SELECT recorded_at, value_kw, source, created_at
            FROM consumption_records
            WHERE recorded_at >= $1 AND recorded_at < $2
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} records", rows.len());
        rows.into_iter().map(Record::try_from).collect()
    }

    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM consumption_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn year_start(year: Period) -> Option<chrono::NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)
}
