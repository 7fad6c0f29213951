use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::schema::MIGRATIONS;

/// Opens a SQLite pool at `url` (e.g. `sqlite://netraven.db` or
/// `sqlite::memory:`) and applies the schema. `MIGRATIONS` uses
/// `CREATE TABLE IF NOT EXISTS`, so this is safe to call on every
/// process start.
pub async fn init_pool(url: &str) -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new().max_connections(8).connect(url).await?;
    sqlx::raw_sql(MIGRATIONS).execute(&pool).await?;
    Ok(pool)
}
