pub mod db;
pub mod tenant;

use sqlx::PgPool;

use crate::config::config;
use crate::database::DatabaseManager;

/// Open a pool against the configured `DATABASE_URL`.
pub(crate) async fn connect() -> anyhow::Result<PgPool> {
    let pool = DatabaseManager::connect(&config().database).await?;
    Ok(pool)
}
