//! Artifacts downloaded from Azure Blob Storage

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::artifact::{ArtifactSource, RawArtifacts};
use crate::domain::DomainError;

const BACKEND: &str = "blob";
const STORAGE_API_VERSION: &str = "2021-08-06";

/// Trait for blob downloads (for mocking)
#[async_trait]
pub trait BlobClient: Send + Sync + std::fmt::Debug {
    /// Download a blob. A missing blob is `DomainError::Artifact`.
    async fn download(&self, container: &str, blob: &str) -> Result<Bytes, DomainError>;
}

/// Blob client speaking the Azure Blob REST API
#[derive(Debug, Clone)]
pub struct HttpBlobClient {
    client: reqwest::Client,
    account_url: String,
    sas_token: Option<String>,
}

impl HttpBlobClient {
    pub fn new(
        account_url: impl Into<String>,
        sas_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            account_url: account_url.into().trim_end_matches('/').to_string(),
            sas_token: sas_token.map(|t| t.trim_start_matches('?').to_string()),
        })
    }

    fn blob_url(&self, container: &str, blob: &str) -> String {
        let mut url = format!("{}/{}/{}", self.account_url, container, blob);
        if let Some(sas) = &self.sas_token {
            url.push('?');
            url.push_str(sas);
        }
        url
    }
}

#[async_trait]
impl BlobClient for HttpBlobClient {
    async fn download(&self, container: &str, blob: &str) -> Result<Bytes, DomainError> {
        let response = self
            .client
            .get(self.blob_url(container, blob))
            .header("x-ms-version", STORAGE_API_VERSION)
            .send()
            .await
            .map_err(|e| DomainError::backend(BACKEND, format!("Request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|e| DomainError::backend(BACKEND, format!("Failed to read blob: {}", e))),
            StatusCode::NOT_FOUND => Err(DomainError::artifact(format!(
                "Blob '{}' not found in container '{}'",
                blob, container
            ))),
            status => Err(DomainError::backend(
                BACKEND,
                format!("Download of '{}/{}' returned HTTP {}", container, blob, status),
            )),
        }
    }
}

/// Fetches the model and transformer blobs from one container
#[derive(Debug, Clone)]
pub struct BlobArtifactSource {
    client: Arc<dyn BlobClient>,
    container: String,
    model_blob: String,
    transformer_blob: String,
    cache_dir: Option<PathBuf>,
    model_name: Option<String>,
}

impl BlobArtifactSource {
    pub fn new(
        client: Arc<dyn BlobClient>,
        container: impl Into<String>,
        model_blob: impl Into<String>,
        transformer_blob: impl Into<String>,
    ) -> Self {
        Self {
            client,
            container: container.into(),
            model_blob: model_blob.into(),
            transformer_blob: transformer_blob.into(),
            cache_dir: None,
            model_name: None,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_model_name(mut self, model_name: Option<String>) -> Self {
        self.model_name = model_name;
        self
    }

    /// Best effort: a failed cache write is logged, never fatal
    async fn write_cache(&self, blob: &str, bytes: &Bytes) {
        let Some(dir) = &self.cache_dir else {
            return;
        };

        let path = dir.join(blob);
        let result = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, bytes).await
        }
        .await;

        match result {
            Ok(()) => debug!(path = %path.display(), "Cached downloaded blob"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to cache blob"),
        }
    }
}

#[async_trait]
impl ArtifactSource for BlobArtifactSource {
    fn kind(&self) -> &'static str {
        "blob"
    }

    fn describe(&self) -> String {
        format!("blob:{}/{}", self.container, self.model_blob)
    }

    async fn fetch(&self) -> Result<RawArtifacts, DomainError> {
        let model_bytes = self.client.download(&self.container, &self.model_blob).await?;
        let transformer_bytes = self
            .client
            .download(&self.container, &self.transformer_blob)
            .await?;

        self.write_cache(&self.model_blob, &model_bytes).await;
        self.write_cache(&self.transformer_blob, &transformer_bytes).await;

        Ok(RawArtifacts {
            model_name: self.model_name.clone(),
            model_version: None,
            model_bytes,
            transformer_bytes,
            origin: format!("{}/{}", self.container, self.model_blob),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, sas: Option<&str>) -> Arc<dyn BlobClient> {
        Arc::new(
            HttpBlobClient::new(server.uri(), sas.map(str::to_string), Duration::from_secs(5))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fetch_downloads_both_blobs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/model.json"))
            .and(query_param("sig", "abc"))
            .and(header("x-ms-version", STORAGE_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"model".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/transformer.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"transformer".to_vec()))
            .mount(&server)
            .await;

        let cache = tempfile::tempdir().unwrap();
        let source = BlobArtifactSource::new(
            client(&server, Some("?sig=abc")),
            "models",
            "model.json",
            "transformer.json",
        )
        .with_cache_dir(Some(cache.path().to_path_buf()));

        let raw = source.fetch().await.unwrap();
        assert_eq!(&raw.model_bytes[..], b"model");
        assert_eq!(&raw.transformer_bytes[..], b"transformer");
        assert_eq!(raw.origin, "models/model.json");

        let cached = std::fs::read(cache.path().join("model.json")).unwrap();
        assert_eq!(cached, b"model");
    }

    #[tokio::test]
    async fn test_missing_blob_is_artifact_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source =
            BlobArtifactSource::new(client(&server, None), "models", "model.json", "t.json");

        let result = source.fetch().await;
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source =
            BlobArtifactSource::new(client(&server, None), "models", "model.json", "t.json");

        let result = source.fetch().await;
        assert!(matches!(result, Err(DomainError::Backend { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_account_is_backend_error() {
        let blob_client = HttpBlobClient::new("http://127.0.0.1:9", None, Duration::from_secs(1))
            .unwrap();

        let result = blob_client.download("models", "model.json").await;
        assert!(matches!(result, Err(DomainError::Backend { .. })));
    }
}
