//! PostgreSQL connection management
//!
//! Resolves the connection URL, builds the pool and answers readiness pings.

use reqwest::Url;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::DomainError;

pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";
const MAINTENANCE_DATABASE: &str = "postgres";

static DATABASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid database name pattern")
});

/// Pool settings for the PostgreSQL connection
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Resolve the database URL from the process environment.
///
/// Order: the configured URL, `DATABASE_URL`, then a URL composed from
/// `POSTGRES_*` variables where `<secrets_dir>/postgres_{user,password,db}`
/// files take precedence over the matching variables.
pub fn resolve_database_url(
    configured: Option<&str>,
    secrets_dir: &Path,
) -> Result<String, DomainError> {
    resolve_database_url_with(configured, secrets_dir, |key| std::env::var(key).ok())
}

fn resolve_database_url_with(
    configured: Option<&str>,
    secrets_dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, DomainError> {
    if let Some(url) = configured.filter(|u| !u.trim().is_empty()) {
        return Ok(url.to_string());
    }

    if let Some(url) = env("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        return Ok(url);
    }

    let part = |secret: &str, var: &str| -> Option<String> {
        read_secret(&secrets_dir.join(secret)).or_else(|| env(var))
    };

    let user = part("postgres_user", "POSTGRES_USER");
    let password = part("postgres_password", "POSTGRES_PASSWORD");
    let database = part("postgres_db", "POSTGRES_DB");

    let (Some(user), Some(database)) = (user, database) else {
        return Err(DomainError::configuration(
            "No database URL configured: set database.url, DATABASE_URL or POSTGRES_USER/POSTGRES_DB",
        ));
    };

    let host = env("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = match env("POSTGRES_PORT") {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| DomainError::configuration(format!("Invalid POSTGRES_PORT '{}'", p)))?,
        None => 5432,
    };

    let mut url = Url::parse("postgres://localhost")
        .map_err(|e| DomainError::internal(format!("Failed to build database URL: {}", e)))?;
    let invalid = |what: &str| DomainError::configuration(format!("Invalid database {}", what));

    url.set_host(Some(&host)).map_err(|_| invalid("host"))?;
    url.set_port(Some(port)).map_err(|_| invalid("port"))?;
    url.set_username(&user).map_err(|_| invalid("user"))?;
    url.set_password(password.as_deref())
        .map_err(|_| invalid("password"))?;
    url.set_path(&format!("/{}", database));

    Ok(url.to_string())
}

fn read_secret(path: &Path) -> Option<String> {
    let value = std::fs::read_to_string(path).ok()?;
    debug!(path = %path.display(), "Read database secret file");
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// Create the connection pool. Fails when the server cannot be reached.
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

    Ok(pool)
}

/// Run `SELECT 1` against the pool
pub async fn ping(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
        .map_err(|e| DomainError::storage(format!("Database is unavailable: {}", e)))
}

/// Name of the database a URL points at
pub fn database_name(url: &str) -> Result<String, DomainError> {
    let parsed = Url::parse(url)
        .map_err(|e| DomainError::configuration(format!("Invalid database URL: {}", e)))?;
    let name = parsed.path().trim_start_matches('/').to_string();

    if name.is_empty() {
        return Err(DomainError::configuration("Database URL has no database name"));
    }
    Ok(name)
}

pub fn validate_database_name(name: &str) -> Result<(), DomainError> {
    if !DATABASE_NAME.is_match(name) {
        return Err(DomainError::validation(format!(
            "Invalid database name '{}'",
            name
        )));
    }
    Ok(())
}

/// Create database `name` on the server behind `url` unless it exists.
/// Returns whether it was created.
pub async fn create_database_if_missing(url: &str, name: &str) -> Result<bool, DomainError> {
    validate_database_name(name)?;

    let mut maintenance = Url::parse(url)
        .map_err(|e| DomainError::configuration(format!("Invalid database URL: {}", e)))?;
    maintenance.set_path(&format!("/{}", MAINTENANCE_DATABASE));

    let config = PostgresConfig::new(maintenance.as_str()).with_max_connections(1);
    let pool = connect_pool(&config).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check database: {}", e)))?;

    if exists {
        info!(database = %name, "Database already exists");
        pool.close().await;
        return Ok(false);
    }

    sqlx::raw_sql(&format!("CREATE DATABASE \"{}\"", name))
        .execute(&pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create database '{}': {}", name, e)))?;
    pool.close().await;

    info!(database = %name, "Database created");
    Ok(true)
}
