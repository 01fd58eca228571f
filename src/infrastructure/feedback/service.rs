//! Feedback service

use std::sync::Arc;

use crate::domain::feedback::{Feedback, FeedbackRepository, NewFeedback};
use crate::domain::prediction::PredictionRepository;
use crate::domain::user::UserId;
use crate::domain::DomainError;

const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug)]
pub struct FeedbackService<F: FeedbackRepository, P: PredictionRepository> {
    feedback: Arc<F>,
    predictions: Arc<P>,
}

impl<F: FeedbackRepository, P: PredictionRepository> FeedbackService<F, P> {
    pub fn new(feedback: Arc<F>, predictions: Arc<P>) -> Self {
        Self {
            feedback,
            predictions,
        }
    }

    async fn require_prediction(&self, prediction_id: i64) -> Result<(), DomainError> {
        match self.predictions.get(prediction_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("Prediction not found")),
        }
    }

    /// Record the caller's verdict on a prediction
    pub async fn create(&self, feedback: NewFeedback) -> Result<Feedback, DomainError> {
        if let Some(comment) = &feedback.comment {
            if comment.chars().count() > MAX_COMMENT_LENGTH {
                return Err(DomainError::validation(format!(
                    "Comment exceeds maximum length of {} characters",
                    MAX_COMMENT_LENGTH
                )));
            }
        }

        self.require_prediction(feedback.prediction_id).await?;
        self.feedback.create(feedback).await
    }

    pub async fn list_for_prediction(
        &self,
        prediction_id: i64,
    ) -> Result<Vec<Feedback>, DomainError> {
        self.require_prediction(prediction_id).await?;
        self.feedback.list_by_prediction(prediction_id).await
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Feedback>, DomainError> {
        self.feedback.list_by_user(user_id).await
    }
}
