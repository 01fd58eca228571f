//! PostgreSQL feedback repository

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::feedback::{Feedback, FeedbackRepository, NewFeedback};
use crate::domain::user::UserId;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct PostgresFeedbackRepository {
    pool: PgPool,
}

impl PostgresFeedbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackRepository for PostgresFeedbackRepository {
    async fn create(&self, feedback: NewFeedback) -> Result<Feedback, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO feedbacks (prediction_id, user_id, correct, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, prediction_id, user_id, correct, comment, created_at
            "#,
        )
        .bind(feedback.prediction_id)
        .bind(feedback.user_id.as_uuid())
        .bind(feedback.correct)
        .bind(feedback.comment.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("foreign key") {
                DomainError::not_found(format!(
                    "Prediction {} not found",
                    feedback.prediction_id
                ))
            } else {
                DomainError::storage(format!("Failed to create feedback: {}", e))
            }
        })?;

        row_to_feedback(&row)
    }

    async fn list_by_prediction(&self, prediction_id: i64) -> Result<Vec<Feedback>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, prediction_id, user_id, correct, comment, created_at
            FROM feedbacks
            WHERE prediction_id = $1
            ORDER BY id
            "#,
        )
        .bind(prediction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list feedback: {}", e)))?;

        rows.iter().map(row_to_feedback).collect()
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Feedback>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, prediction_id, user_id, correct, comment, created_at
            FROM feedbacks
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list feedback: {}", e)))?;

        rows.iter().map(row_to_feedback).collect()
    }

    async fn delete_by_prediction(&self, prediction_id: i64) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM feedbacks WHERE prediction_id = $1")
            .bind(prediction_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete feedback: {}", e)))?;

        Ok(result.rows_affected())
    }
}

fn row_to_feedback(row: &PgRow) -> Result<Feedback, DomainError> {
    let column =
        |e: sqlx::Error| DomainError::storage(format!("Failed to read feedback row: {}", e));

    let user_id: Uuid = row.try_get("user_id").map_err(column)?;

    Ok(Feedback {
        id: row.try_get("id").map_err(column)?,
        prediction_id: row.try_get("prediction_id").map_err(column)?,
        user_id: UserId::from(user_id),
        correct: row.try_get("correct").map_err(column)?,
        comment: row.try_get("comment").map_err(column)?,
        created_at: row.try_get("created_at").map_err(column)?,
    })
}
