//! PostgreSQL prediction and prediction log repositories

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::prediction::{
    NewPrediction, NewPredictionLog, Prediction, PredictionLog, PredictionLogRepository,
    PredictionRepository,
};
use crate::domain::user::UserId;
use crate::domain::DomainError;

const PREDICTION_COLUMNS: &str =
    "id, external_customer_id, user_id, model_id, input_data, prediction, probability, created_at";

/// PostgreSQL implementation of PredictionRepository
#[derive(Debug, Clone)]
pub struct PostgresPredictionRepository {
    pool: PgPool,
}

impl PostgresPredictionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PredictionRepository for PostgresPredictionRepository {
    async fn create(&self, prediction: NewPrediction) -> Result<Prediction, DomainError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO predictions
                (external_customer_id, user_id, model_id, input_data, prediction, probability)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PREDICTION_COLUMNS
        ))
        .bind(prediction.external_customer_id.as_deref())
        .bind(prediction.user_id.map(|id| id.as_uuid()))
        .bind(prediction.model_id)
        .bind(&prediction.input_data)
        .bind(i16::from(prediction.prediction))
        .bind(prediction.probability)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create prediction: {}", e)))?;

        row_to_prediction(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<Prediction>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM predictions WHERE id = $1",
            PREDICTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get prediction: {}", e)))?;

        row.as_ref().map(row_to_prediction).transpose()
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Prediction>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM predictions ORDER BY id LIMIT $1 OFFSET $2",
            PREDICTION_COLUMNS
        ))
        .bind(to_sql_bigint(limit))
        .bind(to_sql_bigint(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list predictions: {}", e)))?;

        rows.iter().map(row_to_prediction).collect()
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM predictions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete prediction: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Saturates at `i64::MAX` so huge offsets read as "past the end"
fn to_sql_bigint(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn row_to_prediction(row: &PgRow) -> Result<Prediction, DomainError> {
    let column =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read prediction row: {}", e));

    let user_id: Option<Uuid> = row.try_get("user_id").map_err(column)?;
    let label: i16 = row.try_get("prediction").map_err(column)?;
    let label = u8::try_from(label)
        .map_err(|_| DomainError::storage(format!("Invalid stored label {}", label)))?;

    Ok(Prediction {
        id: row.try_get("id").map_err(column)?,
        external_customer_id: row.try_get("external_customer_id").map_err(column)?,
        user_id: user_id.map(UserId::from),
        model_id: row.try_get("model_id").map_err(column)?,
        input_data: row.try_get("input_data").map_err(column)?,
        prediction: label,
        probability: row.try_get("probability").map_err(column)?,
        created_at: row.try_get("created_at").map_err(column)?,
    })
}

/// PostgreSQL implementation of PredictionLogRepository
#[derive(Debug, Clone)]
pub struct PostgresPredictionLogRepository {
    pool: PgPool,
}

impl PostgresPredictionLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PredictionLogRepository for PostgresPredictionLogRepository {
    async fn create(&self, log: NewPredictionLog) -> Result<PredictionLog, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO predictionlogs (prediction_id, user_id, request_ip, user_agent)
            VALUES ($1, $2, $3, $4)
            RETURNING id, prediction_id, user_id, request_ip, user_agent, timestamp
            "#,
        )
        .bind(log.prediction_id)
        .bind(log.user_id.map(|id| id.as_uuid()))
        .bind(log.request_ip.as_deref())
        .bind(log.user_agent.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!(
                    "Prediction {} already has a log entry",
                    log.prediction_id
                ))
            } else {
                DomainError::storage(format!("Failed to create prediction log: {}", e))
            }
        })?;

        row_to_log(&row)
    }

    async fn get_by_prediction(
        &self,
        prediction_id: i64,
    ) -> Result<Option<PredictionLog>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, prediction_id, user_id, request_ip, user_agent, timestamp
            FROM predictionlogs
            WHERE prediction_id = $1
            "#,
        )
        .bind(prediction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get prediction log: {}", e)))?;

        row.as_ref().map(row_to_log).transpose()
    }

    async fn delete_by_prediction(&self, prediction_id: i64) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM predictionlogs WHERE prediction_id = $1")
            .bind(prediction_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete prediction log: {}", e)))?;

        Ok(result.rows_affected())
    }
}

fn row_to_log(row: &PgRow) -> Result<PredictionLog, DomainError> {
    let column =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read prediction log row: {}", e));

    let user_id: Option<Uuid> = row.try_get("user_id").map_err(column)?;

    Ok(PredictionLog {
        id: row.try_get("id").map_err(column)?,
        prediction_id: row.try_get("prediction_id").map_err(column)?,
        user_id: user_id.map(UserId::from),
        request_ip: row.try_get("request_ip").map_err(column)?,
        user_agent: row.try_get("user_agent").map_err(column)?,
        timestamp: row.try_get("timestamp").map_err(column)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sql_bigint_saturates() {
        assert_eq!(to_sql_bigint(100), 100);
        assert_eq!(to_sql_bigint(usize::MAX), i64::MAX);
    }
}
