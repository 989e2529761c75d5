use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pantry_api::config::Config;
use pantry_api::db;
use pantry_api::routes::create_router;
use pantry_api::state::AppState;
use pantry_api::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::postgres::create_pool(&config.database_url, config.max_connections).await?;
    sqlx::migrate!().run(&pool).await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(Arc::new(PgStore::new(pool)), Arc::new(config));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
