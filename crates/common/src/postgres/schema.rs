use crate::postgres::PostgresClient;
use anyhow::{Context, Result};
use tracing::info;

const SCHEMA: &str = include_str!("../../migrations/0001_schema.sql");

/// Creates the identity tables if they do not exist yet
pub async fn ensure_schema(client: &PostgresClient) -> Result<()> {
    let conn = client.get_connection().await?;
    conn.batch_execute(SCHEMA)
        .await
        .context("failed to apply schema")?;
    info!("database schema ready");
    Ok(())
}
