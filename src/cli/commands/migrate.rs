use crate::config::AppConfig;
use crate::database::DatabaseManager;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config).await?;
    DatabaseManager::migrate(&pool).await?;
    pool.close().await;
    Ok(())
}
