//! Database migrations
//!
//! Versioned, idempotent schema changes recorded in a `_migrations` table.

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// PostgreSQL migrator tracking applied versions in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Applies a migration unless its version is already recorded.
    /// Returns whether it ran.
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
                .bind(migration.version)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to check migration status: {}", e))
                })?;

        if applied {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to start migration: {}", e)))?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit().await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to commit migration {}: {}",
                migration.version, e
            ))
        })?;

        info!(
            version = migration.version,
            description = migration.description,
            "Applied migration"
        );
        Ok(true)
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))
    }

    /// Applies every pending migration in version order
    pub async fn run_all(&self, migrations: &[Migration]) -> Result<usize, DomainError> {
        self.ensure_migrations_table().await?;

        let mut applied = 0;
        for migration in migrations {
            if self.run_migration(migration).await? {
                applied += 1;
            }
        }
        Ok(applied)
    }
}

/// A versioned schema change
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up: &'static str,
}

impl Migration {
    pub const fn new(version: i64, description: &'static str, up: &'static str) -> Self {
        Self {
            version,
            description,
            up,
        }
    }
}

/// Schema for users, models, predictions, feedback and request logs
pub fn schema_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create users table",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) UNIQUE,
                phone VARCHAR(32) UNIQUE,
                full_name VARCHAR(255),
                team VARCHAR(255),
                address TEXT,
                hashed_password TEXT NOT NULL,
                role VARCHAR(16) NOT NULL DEFAULT 'user',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        ),
        Migration::new(
            2,
            "Create mlmodels table",
            r#"
            CREATE TABLE IF NOT EXISTS mlmodels (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                version VARCHAR(255) NOT NULL,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        ),
        Migration::new(
            3,
            "Create predictions table",
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id BIGSERIAL PRIMARY KEY,
                external_customer_id VARCHAR(255),
                user_id UUID REFERENCES users(id),
                model_id BIGINT REFERENCES mlmodels(id),
                input_data TEXT NOT NULL,
                prediction SMALLINT NOT NULL CHECK (prediction IN (0, 1)),
                probability DOUBLE PRECISION NOT NULL CHECK (probability >= 0 AND probability <= 1),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_predictions_user_id ON predictions(user_id);
            CREATE INDEX IF NOT EXISTS idx_predictions_external_customer_id
                ON predictions(external_customer_id);
            "#,
        ),
        Migration::new(
            4,
            "Create feedbacks table",
            r#"
            CREATE TABLE IF NOT EXISTS feedbacks (
                id BIGSERIAL PRIMARY KEY,
                prediction_id BIGINT NOT NULL REFERENCES predictions(id),
                user_id UUID NOT NULL REFERENCES users(id),
                correct BOOLEAN,
                comment TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_feedbacks_prediction_id ON feedbacks(prediction_id);
            CREATE INDEX IF NOT EXISTS idx_feedbacks_user_id ON feedbacks(user_id);
            "#,
        ),
        Migration::new(
            5,
            "Create predictionlogs table",
            r#"
            CREATE TABLE IF NOT EXISTS predictionlogs (
                id BIGSERIAL PRIMARY KEY,
                prediction_id BIGINT NOT NULL UNIQUE REFERENCES predictions(id),
                user_id UUID REFERENCES users(id),
                request_ip VARCHAR(64),
                user_agent TEXT,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        ),
    ]
}

/// Runs all pending schema migrations
pub async fn run_schema_migrations(pool: &PgPool) -> Result<(), DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());
    let applied = migrator.run_all(&schema_migrations()).await?;
    let version = migrator.current_version().await?;

    info!(applied = applied, version = ?version, "Database schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_migrations_order() {
        let migrations = schema_migrations();

        assert_eq!(migrations.len(), 5);
        for i in 1..migrations.len() {
            assert!(
                migrations[i].version > migrations[i - 1].version,
                "Migrations should be in ascending order"
            );
        }
    }

    #[test]
    fn test_schema_migrations_are_idempotent_ddl() {
        for migration in schema_migrations() {
            assert!(!migration.description.is_empty());
            assert!(migration.up.contains("IF NOT EXISTS"));
        }
    }

    #[test]
    fn test_feedback_does_not_cascade() {
        let feedbacks = schema_migrations()
            .into_iter()
            .find(|m| m.description.contains("feedbacks"))
            .unwrap();

        assert!(!feedbacks.up.to_uppercase().contains("ON DELETE CASCADE"));
    }
}
