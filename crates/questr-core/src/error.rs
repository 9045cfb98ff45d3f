use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage quota exceeded writing '{key}': {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}
