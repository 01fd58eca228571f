//! Prediction repository traits

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{NewPrediction, NewPredictionLog, Prediction, PredictionLog};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Repository for prediction persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PredictionRepository: Send + Sync + Debug {
    /// Stores a prediction and returns it with its assigned id
    async fn create(&self, prediction: NewPrediction) -> Result<Prediction, DomainError>;

    async fn get(&self, id: i64) -> Result<Option<Prediction>, DomainError>;

    /// Lists predictions ordered by id
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Prediction>, DomainError>;

    /// Deletes a prediction, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool, DomainError>;
}

/// Repository for prediction request logs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PredictionLogRepository: Send + Sync + Debug {
    async fn create(&self, log: NewPredictionLog) -> Result<PredictionLog, DomainError>;

    async fn get_by_prediction(
        &self,
        prediction_id: i64,
    ) -> Result<Option<PredictionLog>, DomainError>;

    /// Deletes the log rows of a prediction, returning how many were removed
    async fn delete_by_prediction(&self, prediction_id: i64) -> Result<u64, DomainError>;
}
