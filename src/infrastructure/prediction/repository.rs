//! In-memory prediction and prediction log repositories

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::prediction::{
    NewPrediction, NewPredictionLog, Prediction, PredictionLog, PredictionLogRepository,
    PredictionRepository,
};
use crate::domain::DomainError;

/// In-memory implementation of PredictionRepository
#[derive(Debug)]
pub struct InMemoryPredictionRepository {
    predictions: RwLock<BTreeMap<i64, Prediction>>,
    next_id: AtomicI64,
}

impl InMemoryPredictionRepository {
    pub fn new() -> Self {
        Self {
            predictions: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPredictionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PredictionRepository for InMemoryPredictionRepository {
    async fn create(&self, prediction: NewPrediction) -> Result<Prediction, DomainError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let prediction = prediction.into_prediction(id, Utc::now());

        self.predictions
            .write()
            .await
            .insert(id, prediction.clone());
        Ok(prediction)
    }

    async fn get(&self, id: i64) -> Result<Option<Prediction>, DomainError> {
        Ok(self.predictions.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Prediction>, DomainError> {
        let predictions = self.predictions.read().await;
        Ok(predictions.values().skip(offset).take(limit).cloned().collect())
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        Ok(self.predictions.write().await.remove(&id).is_some())
    }
}

/// In-memory implementation of PredictionLogRepository
#[derive(Debug)]
pub struct InMemoryPredictionLogRepository {
    logs: RwLock<BTreeMap<i64, PredictionLog>>,
    next_id: AtomicI64,
}

impl InMemoryPredictionLogRepository {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPredictionLogRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PredictionLogRepository for InMemoryPredictionLogRepository {
    async fn create(&self, log: NewPredictionLog) -> Result<PredictionLog, DomainError> {
        let mut logs = self.logs.write().await;

        if logs.values().any(|l| l.prediction_id == log.prediction_id) {
            return Err(DomainError::conflict(format!(
                "Prediction {} already has a log entry",
                log.prediction_id
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let log = log.into_log(id, Utc::now());
        logs.insert(id, log.clone());
        Ok(log)
    }

    async fn get_by_prediction(
        &self,
        prediction_id: i64,
    ) -> Result<Option<PredictionLog>, DomainError> {
        let logs = self.logs.read().await;
        Ok(logs
            .values()
            .find(|l| l.prediction_id == prediction_id)
            .cloned())
    }

    async fn delete_by_prediction(&self, prediction_id: i64) -> Result<u64, DomainError> {
        let mut logs = self.logs.write().await;
        let before = logs.len();
        logs.retain(|_, l| l.prediction_id != prediction_id);
        Ok((before - logs.len()) as u64)
    }
}
