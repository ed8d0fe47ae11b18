use std::sync::Arc;

use lectern_api::config::config;
use lectern_api::database::{ensure_schema, DatabaseManager};
use lectern_api::tenant::PgTenantDirectory;
use lectern_api::{app, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lectern_api=info,tower_http=info")),
        )
        .init();

    let config = config();
    tracing::info!("Starting Lectern API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database).await?;
    ensure_schema(&pool).await?;

    let directory = Arc::new(PgTenantDirectory::new(pool.clone()));
    let state = AppState::new(pool, directory, &config.tenancy);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Lectern API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
