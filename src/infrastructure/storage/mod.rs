//! Storage infrastructure - backend selection, PostgreSQL pool and schema migrations

mod backend;
mod database;
pub mod migrations;

pub use backend::{StorageBackend, StorageConfig};
pub use database::{
    connect_pool, create_database_if_missing, database_name, ping, resolve_database_url,
    validate_database_name, PostgresConfig, DEFAULT_SECRETS_DIR,
};
pub use migrations::{run_schema_migrations, Migration, PostgresMigrator};
