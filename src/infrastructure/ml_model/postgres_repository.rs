//! PostgreSQL MLModel repository

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::ml_model::{MlModel, MlModelRepository, NewMlModel};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct PostgresMlModelRepository {
    pool: PgPool,
}

impl PostgresMlModelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MlModelRepository for PostgresMlModelRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<MlModel>, DomainError> {
        let row = sqlx::query(
            "SELECT id, name, version, description, created_at FROM mlmodels WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get MLModel: {}", e)))?;

        row.as_ref().map(row_to_model).transpose()
    }

    async fn create(&self, model: NewMlModel) -> Result<MlModel, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO mlmodels (name, version, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, version, description, created_at
            "#,
        )
        .bind(&model.name)
        .bind(&model.version)
        .bind(model.description.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!("MLModel '{}' already exists", model.name))
            } else {
                DomainError::storage(format!("Failed to create MLModel: {}", e))
            }
        })?;

        row_to_model(&row)
    }

    async fn list(&self) -> Result<Vec<MlModel>, DomainError> {
        let rows = sqlx::query(
            "SELECT id, name, version, description, created_at FROM mlmodels ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list MLModels: {}", e)))?;

        rows.iter().map(row_to_model).collect()
    }
}

fn row_to_model(row: &PgRow) -> Result<MlModel, DomainError> {
    let column =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read MLModel row: {}", e));

    Ok(MlModel {
        id: row.try_get("id").map_err(column)?,
        name: row.try_get("name").map_err(column)?,
        version: row.try_get("version").map_err(column)?,
        description: row.try_get("description").map_err(column)?,
        created_at: row.try_get("created_at").map_err(column)?,
    })
}
