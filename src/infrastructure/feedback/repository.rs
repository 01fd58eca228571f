//! In-memory feedback repository

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::feedback::{Feedback, FeedbackRepository, NewFeedback};
use crate::domain::user::UserId;
use crate::domain::DomainError;

#[derive(Debug)]
pub struct InMemoryFeedbackRepository {
    entries: RwLock<BTreeMap<i64, Feedback>>,
    next_id: AtomicI64,
}

impl InMemoryFeedbackRepository {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryFeedbackRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn create(&self, feedback: NewFeedback) -> Result<Feedback, DomainError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let feedback = feedback.into_feedback(id, Utc::now());

        self.entries.write().await.insert(id, feedback.clone());
        Ok(feedback)
    }

    async fn list_by_prediction(&self, prediction_id: i64) -> Result<Vec<Feedback>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|f| f.prediction_id == prediction_id)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Feedback>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|f| f.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn delete_by_prediction(&self, prediction_id: i64) -> Result<u64, DomainError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, f| f.prediction_id != prediction_id);
        Ok((before - entries.len()) as u64)
    }
}
