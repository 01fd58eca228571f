//! In-memory MLModel repository

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::ml_model::{MlModel, MlModelRepository, NewMlModel};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct InMemoryMlModelRepository {
    models: RwLock<BTreeMap<i64, MlModel>>,
    next_id: AtomicI64,
}

impl InMemoryMlModelRepository {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryMlModelRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MlModelRepository for InMemoryMlModelRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<MlModel>, DomainError> {
        let models = self.models.read().await;
        Ok(models.values().find(|m| m.name == name).cloned())
    }

    async fn create(&self, model: NewMlModel) -> Result<MlModel, DomainError> {
        let mut models = self.models.write().await;

        if models.values().any(|m| m.name == model.name) {
            return Err(DomainError::conflict(format!(
                "MLModel '{}' already exists",
                model.name
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let model = model.into_model(id, Utc::now());
        models.insert(id, model.clone());
        Ok(model)
    }

    async fn list(&self) -> Result<Vec<MlModel>, DomainError> {
        Ok(self.models.read().await.values().cloned().collect())
    }
}
