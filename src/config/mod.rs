use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub transaction_timeout_ms: u64,
    pub auto_migrate: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
}

// Keep the signing key out of debug logs.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(v) = env::var("API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?;
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_TRANSACTION_TIMEOUT_MS") {
            self.database.transaction_timeout_ms = v.parse().unwrap_or(self.database.transaction_timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_AUTO_MIGRATE") {
            self.database.auto_migrate = v.parse().unwrap_or(self.database.auto_migrate);
        }

        // Security overrides
        if let Some(v) = env::var("JWT_KEY").ok().or_else(|| env::var("JWT_SECRET").ok()) {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(self)
    }

    /// Fails when a value required to serve requests is absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_KEY"));
        }
        self.token_ttl()?;
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Token lifetime; between one hour and ten years.
    pub fn token_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let hours = self.security.jwt_expiry_hours;
        let invalid = || ConfigError::Invalid {
            key: "SECURITY_JWT_EXPIRY_HOURS",
            value: hours.to_string(),
        };
        if hours == 0 || hours > MAX_JWT_EXPIRY_HOURS {
            return Err(invalid());
        }
        i64::try_from(hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(invalid)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.database.transaction_timeout_ms)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                transaction_timeout_ms: 10_000,
                auto_migrate: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_request_size_bytes: 512 * 1024,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                transaction_timeout_ms: 5_000,
                auto_migrate: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_request_size_bytes: 256 * 1024,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                transaction_timeout_ms: 3_000,
                auto_migrate: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }

    /// Development defaults with a fixed signing key, for tests.
    pub fn for_tests() -> Self {
        let mut config = Self::development();
        config.security.jwt_secret = "test-signing-key".to_string();
        config.database.transaction_timeout_ms = 2_000;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.security.jwt_expiry_hours, 168);
        assert!(config.database.auto_migrate);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.database.auto_migrate);
        assert_eq!(config.database.max_connections, 50);
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = AppConfig::development();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("JWT_KEY"))));
        assert!(AppConfig::for_tests().validate().is_ok());
    }

    #[test]
    fn test_token_ttl_bounds() {
        let mut config = AppConfig::for_tests();
        assert_eq!(config.token_ttl().unwrap(), chrono::Duration::hours(168));

        for hours in [0, MAX_JWT_EXPIRY_HOURS + 1, u64::MAX] {
            config.security.jwt_expiry_hours = hours;
            assert!(
                matches!(config.token_ttl(), Err(ConfigError::Invalid { key: "SECURITY_JWT_EXPIRY_HOURS", .. })),
                "{}",
                hours
            );
            assert!(config.validate().is_err(), "{}", hours);
        }

        config.security.jwt_expiry_hours = MAX_JWT_EXPIRY_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_url_missing() {
        let mut config = AppConfig::for_tests();
        assert!(config.database_url().is_err());
        config.database.url = Some("postgres://localhost/shop".to_string());
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/shop");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", AppConfig::for_tests());
        assert!(!rendered.contains("test-signing-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
