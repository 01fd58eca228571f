//! MLModel domain - records naming the trained artifacts behind predictions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::DomainError;

/// Version recorded when the artifact does not carry one
pub const UNKNOWN_MODEL_VERSION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlModel {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMlModel {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

impl NewMlModel {
    /// Record created the first time a model name shows up in a prediction
    pub fn auto_created(name: impl Into<String>, version: Option<&str>) -> Self {
        let name = name.into();
        let description = format!("Auto-created record for model {}", name);

        Self {
            name,
            version: version.unwrap_or(UNKNOWN_MODEL_VERSION).to_string(),
            description: Some(description),
        }
    }

    pub fn into_model(self, id: i64, created_at: DateTime<Utc>) -> MlModel {
        MlModel {
            id,
            name: self.name,
            version: self.version,
            description: self.description,
            created_at,
        }
    }
}

/// Repository for MLModel records
#[async_trait]
pub trait MlModelRepository: Send + Sync + Debug {
    async fn get_by_name(&self, name: &str) -> Result<Option<MlModel>, DomainError>;

    async fn create(&self, model: NewMlModel) -> Result<MlModel, DomainError>;

    async fn list(&self) -> Result<Vec<MlModel>, DomainError>;

    /// Returns the record for `name`, creating it when it does not exist yet
    async fn find_or_create(&self, model: NewMlModel) -> Result<MlModel, DomainError> {
        if let Some(existing) = self.get_by_name(&model.name).await? {
            return Ok(existing);
        }

        let name = model.name.clone();
        match self.create(model).await {
            Ok(created) => Ok(created),
            // Lost a race with a concurrent insert of the same name
            Err(DomainError::Conflict { .. }) => self
                .get_by_name(&name)
                .await?
                .ok_or_else(|| DomainError::internal(format!("MLModel '{}' vanished", name))),
            Err(e) => Err(e),
        }
    }
}
