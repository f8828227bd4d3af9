//! Database connection management.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::{Config, Error, Result};

/// Tables are created idempotently on cold start.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS chats (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id TEXT NOT NULL,
        history JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS chats_user_id_created_at_idx ON chats (user_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS user_chats (
        user_id TEXT PRIMARY KEY,
        chats JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Create a database connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    Ok(pool)
}

/// Connect using the environment config and make sure the schema exists.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let pool = create_pool(config.database_url()?).await?;
    ensure_schema(&pool).await?;
    info!("connected to database");
    Ok(pool)
}

/// Create the chat tables if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
