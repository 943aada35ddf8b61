use crate::config::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

const MAX_CONNECT_ATTEMPTS: u32 = 5;

// Exponential backoff so a cold start can wait out the database container
// coming up. Capped at 30s per attempt.
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                info!("Connected to PostgreSQL");
                return Ok(pool);
            }
            Err(err) if attempt < MAX_CONNECT_ATTEMPTS => {
                let delay = Duration::from_secs(1 << (attempt - 1)).min(Duration::from_secs(30));
                warn!(
                    "Database connection attempt {attempt}/{MAX_CONNECT_ATTEMPTS} failed: {err}; retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
