use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::debug;

use crate::error::CoreError;

pub use sqlx::SqlitePool as DbPool;

/// Opens the key-value database at `db_path`, creating the file and its
/// parent directory when missing, and applies the `kv_store` migration.
pub async fn establish_connection(db_path: &str) -> Result<SqlitePool, CoreError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    if !Path::new(db_path).exists() {
        tokio::fs::File::create(db_path).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_path)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    debug!(path = db_path, "Database ready");

    Ok(pool)
}
