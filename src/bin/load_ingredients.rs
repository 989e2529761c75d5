//! Loads the ingredient catalog from a JSON file into the database.
//!
//! Usage: `load_ingredients <path/to/ingredients.json>` where the file is an
//! array of `{"name": "...", "measurement_unit": "..."}` objects. Existing
//! (name, unit) pairs are left untouched.

use std::fs;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use pantry_api::config::Config;
use pantry_api::db;

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    measurement_unit: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Usage: load_ingredients <ingredients.json>"))?;

    let config = Config::from_env()?;
    let pool = db::postgres::create_pool(&config.database_url, config.max_connections).await?;
    sqlx::migrate!().run(&pool).await?;

    let raw = fs::read_to_string(&path)?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)?;

    let mut inserted = 0u64;
    for entry in &entries {
        let result = sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) \
             ON CONFLICT (name, measurement_unit) DO NOTHING",
        )
        .bind(&entry.name)
        .bind(&entry.measurement_unit)
        .execute(&pool)
        .await?;
        inserted += result.rows_affected();
    }

    tracing::info!(
        total = entries.len(),
        inserted,
        "ingredient catalog loaded"
    );

    Ok(())
}
