//! Feedback domain - user verdicts on individual predictions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::user::UserId;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub prediction_id: i64,
    pub user_id: UserId,
    /// Whether the caller judged the prediction correct
    pub correct: Option<bool>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub prediction_id: i64,
    pub user_id: UserId,
    pub correct: Option<bool>,
    pub comment: Option<String>,
}

impl NewFeedback {
    pub fn into_feedback(self, id: i64, created_at: DateTime<Utc>) -> Feedback {
        Feedback {
            id,
            prediction_id: self.prediction_id,
            user_id: self.user_id,
            correct: self.correct,
            comment: self.comment,
            created_at,
        }
    }
}

/// Repository for feedback persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedbackRepository: Send + Sync + Debug {
    async fn create(&self, feedback: NewFeedback) -> Result<Feedback, DomainError>;

    async fn list_by_prediction(&self, prediction_id: i64) -> Result<Vec<Feedback>, DomainError>;

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Feedback>, DomainError>;

    /// Deletes every feedback row of a prediction, returning how many were removed
    async fn delete_by_prediction(&self, prediction_id: i64) -> Result<u64, DomainError>;
}
