use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Builds the shared connection pool and applies schema migrations.
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &AppConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .database_url()
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to database: {}", Self::redacted(url));
        Ok(pool)
    }

    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Connection URL with credentials stripped, safe for logs. Never fails:
    /// the pool may already be open when this is called.
    fn redacted(url: &str) -> String {
        Self::try_redact(url).unwrap_or_else(|| "<unparseable url>".to_string())
    }

    fn try_redact(url: &str) -> Option<String> {
        let mut url = url::Url::parse(url).ok()?;
        if url.cannot_be_a_base() {
            return None;
        }
        if !url.username().is_empty() {
            url.set_username("***").ok()?;
        }
        if url.password().is_some() {
            url.set_password(Some("***")).ok()?;
        }
        Some(url.into())
    }
}
