//! Artifacts resolved through an MLflow tracking server

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::config::RegistrySelection;
use crate::domain::artifact::{ArtifactSource, RawArtifacts};
use crate::domain::DomainError;

const BACKEND: &str = "mlflow";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Run search parameters, serialized as the `runs/search` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSearch {
    pub experiment_ids: Vec<String>,
    pub filter: String,
    pub order_by: Vec<String>,
    pub max_results: u32,
}

/// Trait for tracking server operations (for mocking)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingClient: Send + Sync + std::fmt::Debug {
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, DomainError>;

    async fn search_runs(&self, search: RunSearch) -> Result<Vec<RunInfo>, DomainError>;

    async fn get_latest_versions(&self, model_name: &str)
        -> Result<Vec<ModelVersion>, DomainError>;

    /// Download one artifact file of a run
    async fn download_artifact(&self, run_id: &str, path: &str) -> Result<Bytes, DomainError>;
}

/// Tracking client speaking the MLflow REST API
#[derive(Debug, Clone)]
pub struct HttpTrackingClient {
    client: reqwest::Client,
    tracking_uri: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ExperimentResponse {
    experiment: Experiment,
}

#[derive(Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<RunEnvelope>,
}

#[derive(Deserialize)]
struct RunEnvelope {
    info: RunInfo,
}

#[derive(Deserialize)]
struct LatestVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
}

impl HttpTrackingClient {
    pub fn new(
        tracking_uri: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            tracking_uri: tracking_uri.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.tracking_uri, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DomainError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        request
            .send()
            .await
            .map_err(|e| DomainError::backend(BACKEND, format!("Request failed: {}", e)))
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, DomainError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::backend(
                BACKEND,
                format!("HTTP {}: {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::backend(BACKEND, format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl TrackingClient for HttpTrackingClient {
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, DomainError> {
        let request = self
            .client
            .get(self.url("/api/2.0/mlflow/experiments/get-by-name"))
            .query(&[("experiment_name", name)]);
        let response = self.send(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: ExperimentResponse = Self::json(response).await?;
        Ok(Some(body.experiment))
    }

    async fn search_runs(&self, search: RunSearch) -> Result<Vec<RunInfo>, DomainError> {
        let request = self
            .client
            .post(self.url("/api/2.0/mlflow/runs/search"))
            .json(&search);
        let body: SearchRunsResponse = Self::json(self.send(request).await?).await?;

        Ok(body.runs.into_iter().map(|r| r.info).collect())
    }

    async fn get_latest_versions(
        &self,
        model_name: &str,
    ) -> Result<Vec<ModelVersion>, DomainError> {
        let request = self
            .client
            .post(self.url("/api/2.0/mlflow/registered-models/get-latest-versions"))
            .json(&serde_json::json!({ "name": model_name }));
        let response = self.send(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let body: LatestVersionsResponse = Self::json(response).await?;
        Ok(body.model_versions)
    }

    async fn download_artifact(&self, run_id: &str, path: &str) -> Result<Bytes, DomainError> {
        let request = self
            .client
            .get(self.url("/get-artifact"))
            .query(&[("path", path), ("run_uuid", run_id)]);
        let response = self.send(request).await?;

        match response.status() {
            status if status.is_success() => response.bytes().await.map_err(|e| {
                DomainError::backend(BACKEND, format!("Failed to read artifact: {}", e))
            }),
            StatusCode::NOT_FOUND => Err(DomainError::artifact(format!(
                "Artifact '{}' not found in run {}",
                path, run_id
            ))),
            status => Err(DomainError::backend(
                BACKEND,
                format!("Artifact download returned HTTP {}", status),
            )),
        }
    }
}

/// Resolves "the latest" model through the tracking server, then downloads
/// the run's model and transformer artifacts
#[derive(Debug, Clone)]
pub struct RegistryArtifactSource {
    client: Arc<dyn TrackingClient>,
    selection: RegistrySelection,
    model_artifact: String,
    transformer_artifact: String,
}

/// The run chosen by a selection, with the name and version to record
#[derive(Debug, Clone, PartialEq)]
struct ResolvedRun {
    run_id: String,
    model_name: Option<String>,
    version: String,
}

impl RegistryArtifactSource {
    pub fn new(
        client: Arc<dyn TrackingClient>,
        selection: RegistrySelection,
        model_artifact: impl Into<String>,
        transformer_artifact: impl Into<String>,
    ) -> Self {
        Self {
            client,
            selection,
            model_artifact: model_artifact.into(),
            transformer_artifact: transformer_artifact.into(),
        }
    }

    async fn resolve(&self) -> Result<ResolvedRun, DomainError> {
        match &self.selection {
            RegistrySelection::LatestRun {
                experiment_name,
                run_name_prefix,
            } => self.latest_run(experiment_name, run_name_prefix).await,
            RegistrySelection::RegisteredModel { name } => self.latest_version(name).await,
        }
    }

    async fn latest_run(
        &self,
        experiment_name: &str,
        prefix: &str,
    ) -> Result<ResolvedRun, DomainError> {
        let experiment = self
            .client
            .get_experiment_by_name(experiment_name)
            .await?
            .ok_or_else(|| {
                DomainError::artifact(format!("Experiment '{}' not found", experiment_name))
            })?;

        let search = RunSearch {
            experiment_ids: vec![experiment.experiment_id],
            filter: format!(
                "attributes.run_name LIKE '{}%'",
                prefix.replace('\'', "\\'")
            ),
            order_by: vec!["attributes.start_time DESC".to_string()],
            max_results: 1,
        };

        let run = self
            .client
            .search_runs(search)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DomainError::artifact(format!(
                    "No runs named '{}*' found in experiment '{}'",
                    prefix, experiment_name
                ))
            })?;

        Ok(ResolvedRun {
            version: run.run_id.clone(),
            run_id: run.run_id,
            model_name: None,
        })
    }

    async fn latest_version(&self, name: &str) -> Result<ResolvedRun, DomainError> {
        let versions = self.client.get_latest_versions(name).await?;

        let latest = versions
            .into_iter()
            .max_by(|a, b| version_key(&a.version).cmp(&version_key(&b.version)))
            .ok_or_else(|| {
                DomainError::artifact(format!("Registered model '{}' has no versions", name))
            })?;

        let run_id = latest.run_id.ok_or_else(|| {
            DomainError::artifact(format!(
                "Version {} of model '{}' is not linked to a run",
                latest.version, name
            ))
        })?;

        Ok(ResolvedRun {
            run_id,
            model_name: Some(latest.name),
            version: latest.version,
        })
    }
}

/// Numeric versions order numerically and sort above non-numeric ones
fn version_key(version: &str) -> (u8, u64, String) {
    match version.parse::<u64>() {
        Ok(n) => (1, n, String::new()),
        Err(_) => (0, 0, version.to_string()),
    }
}

#[async_trait]
impl ArtifactSource for RegistryArtifactSource {
    fn kind(&self) -> &'static str {
        "registry"
    }

    fn describe(&self) -> String {
        match &self.selection {
            RegistrySelection::LatestRun {
                experiment_name,
                run_name_prefix,
            } => format!("registry:experiment/{}/{}*", experiment_name, run_name_prefix),
            RegistrySelection::RegisteredModel { name } => format!("registry:model/{}", name),
        }
    }

    async fn fetch(&self) -> Result<RawArtifacts, DomainError> {
        let run = self.resolve().await?;
        info!(run_id = %run.run_id, version = %run.version, "Resolved registry run");

        let model_bytes = self
            .client
            .download_artifact(&run.run_id, &self.model_artifact)
            .await?;
        let transformer_bytes = self
            .client
            .download_artifact(&run.run_id, &self.transformer_artifact)
            .await?;

        Ok(RawArtifacts {
            model_name: run.model_name,
            model_version: Some(run.version),
            model_bytes,
            transformer_bytes,
            origin: format!("runs:/{}/{}", run.run_id, self.model_artifact),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn latest_run_selection() -> RegistrySelection {
        RegistrySelection::LatestRun {
            experiment_name: "churn".to_string(),
            run_name_prefix: "best_model_".to_string(),
        }
    }

    #[test]
    fn test_version_key_orders_numerically() {
        let mut versions = vec!["9", "10", "2"];
        versions.sort_by_key(|v| version_key(v));
        assert_eq!(versions, vec!["2", "9", "10"]);
    }

    #[tokio::test]
    async fn test_latest_run_over_http() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/experiments/get-by-name"))
            .and(query_param("experiment_name", "churn"))
            .and(header("authorization", "Bearer tracking-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "experiment": {"experiment_id": "4", "name": "churn"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/mlflow/runs/search"))
            .and(body_json(serde_json::json!({
                "experiment_ids": ["4"],
                "filter": "attributes.run_name LIKE 'best_model_%'",
                "order_by": ["attributes.start_time DESC"],
                "max_results": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "runs": [{"info": {"run_id": "r-77", "run_name": "best_model_0412", "start_time": 1}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get-artifact"))
            .and(query_param("run_uuid", "r-77"))
            .and(query_param("path", "best_model/model.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"model".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get-artifact"))
            .and(query_param("run_uuid", "r-77"))
            .and(query_param("path", "best_model/transformer.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"transformer".to_vec()))
            .mount(&server)
            .await;

        let client = HttpTrackingClient::new(
            server.uri(),
            Some("tracking-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let source = RegistryArtifactSource::new(
            Arc::new(client),
            latest_run_selection(),
            "best_model/model.json",
            "best_model/transformer.json",
        );

        let raw = source.fetch().await.unwrap();
        assert_eq!(raw.model_version.as_deref(), Some("r-77"));
        assert!(raw.model_name.is_none());
        assert_eq!(&raw.model_bytes[..], b"model");
        assert_eq!(&raw.transformer_bytes[..], b"transformer");
        assert_eq!(raw.origin, "runs:/r-77/best_model/model.json");
    }

    #[tokio::test]
    async fn test_missing_experiment_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/experiments/get-by-name"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST"
            })))
            .mount(&server)
            .await;

        let client = HttpTrackingClient::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let source =
            RegistryArtifactSource::new(Arc::new(client), latest_run_selection(), "m", "t");

        let result = source.fetch().await;
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }

    #[tokio::test]
    async fn test_no_matching_runs() {
        let mut client = MockTrackingClient::new();
        client
            .expect_get_experiment_by_name()
            .with(eq("churn"))
            .returning(|_| {
                Ok(Some(Experiment {
                    experiment_id: "1".to_string(),
                    name: "churn".to_string(),
                }))
            });
        client.expect_search_runs().returning(|_| Ok(Vec::new()));
        client.expect_download_artifact().never();

        let source =
            RegistryArtifactSource::new(Arc::new(client), latest_run_selection(), "m", "t");

        let result = source.fetch().await;
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }

    #[tokio::test]
    async fn test_registered_model_takes_highest_version() {
        let mut client = MockTrackingClient::new();
        client
            .expect_get_latest_versions()
            .with(eq("churn-classifier"))
            .returning(|name| {
                Ok(vec![
                    ModelVersion {
                        name: name.to_string(),
                        version: "9".to_string(),
                        run_id: Some("run-9".to_string()),
                    },
                    ModelVersion {
                        name: name.to_string(),
                        version: "12".to_string(),
                        run_id: Some("run-12".to_string()),
                    },
                ])
            });
        client
            .expect_download_artifact()
            .withf(|run_id, _| run_id == "run-12")
            .times(2)
            .returning(|_, path| Ok(Bytes::from(path.to_string())));

        let source = RegistryArtifactSource::new(
            Arc::new(client),
            RegistrySelection::RegisteredModel {
                name: "churn-classifier".to_string(),
            },
            "model.json",
            "transformer.json",
        );

        let raw = source.fetch().await.unwrap();
        assert_eq!(raw.model_name.as_deref(), Some("churn-classifier"));
        assert_eq!(raw.model_version.as_deref(), Some("12"));
        assert_eq!(&raw.transformer_bytes[..], b"transformer.json");
    }

    #[tokio::test]
    async fn test_unreachable_tracking_server() {
        let client =
            HttpTrackingClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();

        let result = client.get_experiment_by_name("churn").await;
        assert!(matches!(result, Err(DomainError::Backend { .. })));
    }
}
