use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

const SCHEMA: &str = include_str!("../schema.sql");

pub async fn connect_database(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to postgres")?;

    Ok(pool)
}

/// Creates any missing tables and constraints. Every statement is
/// `IF NOT EXISTS`, so this runs on each startup.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("failed to apply ledger schema")?;
    info!("ledger schema ready");
    Ok(())
}
