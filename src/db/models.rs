use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::db::DbError;
use crate::series::Record;

// Database entity models
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConsumptionRow {
    pub recorded_at: NaiveDateTime,
    pub value_kw: f64,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ConsumptionRow> for Record {
    type Error = DbError;

    fn try_from(row: ConsumptionRow) -> Result<Self, Self::Error> {
        Ok(Record {
            timestamp: row.recorded_at,
            value: Some(row.value_kw),
            source: row.source.parse()?,
        })
    }
}
