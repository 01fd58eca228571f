//! Builds artifact sources and stores from configuration

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::blob::{BlobArtifactSource, HttpBlobClient};
use super::config::{ArtifactSourceConfig, ArtifactsConfig};
use super::local::LocalArtifactSource;
use super::registry::{HttpTrackingClient, RegistryArtifactSource};
use super::store::{ArtifactStore, ArtifactStores};
use crate::domain::artifact::{ArtifactSlot, ArtifactSource};
use crate::domain::DomainError;

/// Factory for creating artifact sources
#[derive(Debug)]
pub struct ArtifactSourceFactory;

impl ArtifactSourceFactory {
    /// Create an artifact source from configuration
    pub fn create(config: &ArtifactSourceConfig) -> Result<Arc<dyn ArtifactSource>, DomainError> {
        match config {
            ArtifactSourceConfig::Local {
                dir,
                model_file,
                transformer_file,
            } => Ok(Arc::new(LocalArtifactSource::new(
                dir.clone(),
                model_file.clone(),
                transformer_file.clone(),
            ))),

            ArtifactSourceConfig::Blob {
                account_url,
                container,
                model_blob,
                transformer_blob,
                sas_token,
                cache_dir,
                model_name,
                timeout_secs,
            } => {
                if account_url.trim().is_empty() || container.trim().is_empty() {
                    return Err(DomainError::configuration(
                        "Blob artifact source requires account_url and container",
                    ));
                }

                let client = HttpBlobClient::new(
                    account_url.clone(),
                    sas_token.clone(),
                    Duration::from_secs(*timeout_secs),
                )?;
                let source = BlobArtifactSource::new(
                    Arc::new(client),
                    container.clone(),
                    model_blob.clone(),
                    transformer_blob.clone(),
                )
                .with_cache_dir(cache_dir.clone())
                .with_model_name(model_name.clone());

                Ok(Arc::new(source))
            }

            ArtifactSourceConfig::Registry {
                tracking_uri,
                token,
                selection,
                model_artifact,
                transformer_artifact,
                timeout_secs,
            } => {
                if tracking_uri.trim().is_empty() {
                    return Err(DomainError::configuration(
                        "Registry artifact source requires tracking_uri",
                    ));
                }

                let client = HttpTrackingClient::new(
                    tracking_uri.clone(),
                    token.clone(),
                    Duration::from_secs(*timeout_secs),
                )?;

                Ok(Arc::new(RegistryArtifactSource::new(
                    Arc::new(client),
                    selection.clone(),
                    model_artifact.clone(),
                    transformer_artifact.clone(),
                )))
            }
        }
    }

    /// Create the stores for both slots. An unconfigured `best_model` slot
    /// shares the default slot's source but caches separately.
    pub fn create_stores(config: &ArtifactsConfig) -> Result<ArtifactStores, DomainError> {
        let default_source = Self::create(&config.default)?;
        let best_model_source = match &config.best_model {
            Some(best_model) => Self::create(best_model)?,
            None => default_source.clone(),
        };

        info!(
            default = %default_source.describe(),
            best_model = %best_model_source.describe(),
            "Configured artifact sources"
        );

        Ok(ArtifactStores::new(
            Arc::new(ArtifactStore::new(ArtifactSlot::Default, default_source)),
            Arc::new(ArtifactStore::new(ArtifactSlot::BestModel, best_model_source)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact::config::RegistrySelection;

    #[test]
    fn test_best_model_falls_back_to_default_source() {
        let stores = ArtifactSourceFactory::create_stores(&ArtifactsConfig::default()).unwrap();

        let default = stores.get(ArtifactSlot::Default);
        let best = stores.get(ArtifactSlot::BestModel);
        assert!(Arc::ptr_eq(default.source(), best.source()));
        assert!(!Arc::ptr_eq(default, best));
        assert_eq!(best.slot(), ArtifactSlot::BestModel);
    }

    #[test]
    fn test_source_kinds() {
        let registry = ArtifactSourceConfig::Registry {
            tracking_uri: "http://mlflow:5000".to_string(),
            token: None,
            selection: RegistrySelection::RegisteredModel {
                name: "churn".to_string(),
            },
            model_artifact: "model.json".to_string(),
            transformer_artifact: "transformer.json".to_string(),
            timeout_secs: 5,
        };
        let source = ArtifactSourceFactory::create(&registry).unwrap();
        assert_eq!(source.kind(), "registry");
        assert_eq!(source.describe(), "registry:model/churn");

        let local = ArtifactSourceFactory::create(&ArtifactSourceConfig::default()).unwrap();
        assert_eq!(local.kind(), "local");
    }

    #[test]
    fn test_blob_requires_container() {
        let config = ArtifactSourceConfig::Blob {
            account_url: "https://acct.blob.core.windows.net".to_string(),
            container: String::new(),
            model_blob: "model.json".to_string(),
            transformer_blob: "transformer.json".to_string(),
            sas_token: None,
            cache_dir: None,
            model_name: None,
            timeout_secs: 5,
        };

        let result = ArtifactSourceFactory::create(&config);
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
