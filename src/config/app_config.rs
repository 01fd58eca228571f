use serde::Deserialize;
use std::path::PathBuf;

use crate::infrastructure::artifact::ArtifactsConfig;
use crate::infrastructure::auth::DEFAULT_TOKEN_EXPIRE_MINUTES;
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::storage::{StorageConfig, DEFAULT_SECRETS_DIR};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// PostgreSQL settings. Without `url` the connection string comes from
/// `DATABASE_URL` or the `POSTGRES_*` variables and secret files.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Falls back to `JWT_SECRET`, then to a random per-process secret
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expire_minutes")]
    pub token_expire_minutes: u64,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
}

fn default_max_connections() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_secrets_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SECRETS_DIR)
}

fn default_token_expire_minutes() -> u64 {
    DEFAULT_TOKEN_EXPIRE_MINUTES
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            run_migrations: true,
            secrets_dir: default_secrets_dir(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expire_minutes: default_token_expire_minutes(),
            admin_username: default_admin_username(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact::ArtifactSourceConfig;
    use crate::infrastructure::storage::StorageBackend;

    fn from_toml(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = from_toml("");

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.auth.token_expire_minutes, 30);
        assert_eq!(config.auth.admin_username, "admin");
        assert!(config.database.run_migrations);
        assert!(config.artifacts.best_model.is_none());
    }

    #[test]
    fn test_sections_are_read() {
        let config = from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [logging]
            level = "debug"
            format = "json"

            [storage]
            backend = "memory"

            [auth]
            token_expire_minutes = 5

            [artifacts]
            preload = true

            [artifacts.default]
            type = "local"
            dir = "/srv/models"

            [artifacts.best_model]
            type = "registry"
            tracking_uri = "http://mlflow:5000"

            [artifacts.best_model.selection]
            mode = "latest_run"
            experiment_name = "churn"
            "#,
        );

        assert_eq!(config.server.host, "127.0.0.1");
        assert!(matches!(config.logging.format, LogFormat::Json));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.token_expire_minutes, 5);
        assert!(config.artifacts.preload);
        assert!(matches!(
            config.artifacts.default,
            ArtifactSourceConfig::Local { .. }
        ));
        assert!(matches!(
            config.artifacts.best_model,
            Some(ArtifactSourceConfig::Registry { .. })
        ));
    }
}
