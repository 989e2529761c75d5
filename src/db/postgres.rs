use sqlx::{postgres::PgPoolOptions, PgPool};

/// Opens the PostgreSQL pool the store runs on.
///
/// `max_connections` comes from `Config`; the pool is shared by the
/// API handlers and the catalog loader.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}
