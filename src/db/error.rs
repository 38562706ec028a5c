use crate::series::ParseSourceError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Stored record has an invalid source tag: {0}")]
    InvalidSource(#[from] ParseSourceError),
}
