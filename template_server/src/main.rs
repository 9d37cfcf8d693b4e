//! Template server: loads settings, prepares the engine and serves the API.
//!
//! Run from repo root: `cargo run -p template-server`
//! Without PostgreSQL: `USE_MEMORY_ENGINE=true cargo run -p template-server`

use crud_template::{api_router, create_tables, user_table, AppState, MemoryDatabase, PgSessionSource, SessionSource, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_filter())),
        )
        .init();
    tracing::info!(mode = %settings.mode, debug = settings.debug, "settings loaded");

    let sessions: Arc<dyn SessionSource> = if settings.use_memory_engine {
        tracing::info!("using in-process engine");
        Arc::new(MemoryDatabase::new())
    } else {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.database_url)
            .await?;
        create_tables(&pool, &[user_table()]).await?;
        Arc::new(PgSessionSource::new(pool))
    };

    let addr = settings.bind_addr();
    let api_version = settings.api_version.clone();
    let mode = settings.mode.clone();
    let app = api_router(AppState::new(sessions, settings));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(mode = %mode, "listening on http://{}{}", listener.local_addr()?, api_version);
    axum::serve(listener, app).await?;
    Ok(())
}
