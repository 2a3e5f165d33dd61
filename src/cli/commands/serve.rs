use std::sync::Arc;

use anyhow::Context;
use tokio::signal;

use crate::auth::{Argon2Hasher, TokenVerifier};
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgStorage};
use crate::handlers::AppState;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    tracing::info!("Starting Commerce API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config).await?;
    if config.database.auto_migrate {
        DatabaseManager::migrate(&pool).await?;
    }

    // Built once; the key stays fixed for the life of the process.
    let verifier = TokenVerifier::new(config.security.jwt_secret.as_bytes(), config.token_ttl()?)
        .context("signing key rejected")?;

    let state = Arc::new(AppState::new(
        PgStorage::new(pool.clone()),
        Arc::new(verifier),
        Arc::new(Argon2Hasher::new()),
        config.transaction_timeout(),
    ));
    let app = crate::create_app(state, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pool.close().await;
    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
