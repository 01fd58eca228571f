//! Artifact source configuration

use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_RUN_NAME_PREFIX: &str = "best_model_";

/// Where a slot loads its artifacts from
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactSourceConfig {
    /// A directory on local disk
    Local {
        #[serde(default = "default_models_dir")]
        dir: PathBuf,
        /// Explicit model file; otherwise the newest `<id>_model.json`, then `model.json`
        #[serde(default)]
        model_file: Option<String>,
        #[serde(default = "default_transformer_file")]
        transformer_file: String,
    },
    /// Azure Blob Storage container
    Blob {
        /// e.g. `https://<account>.blob.core.windows.net`
        account_url: String,
        container: String,
        #[serde(default = "default_model_blob")]
        model_blob: String,
        #[serde(default = "default_transformer_file")]
        transformer_blob: String,
        /// Shared access signature appended to each request
        #[serde(default)]
        sas_token: Option<String>,
        /// Keep a copy of downloaded blobs in this directory
        #[serde(default)]
        cache_dir: Option<PathBuf>,
        #[serde(default)]
        model_name: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// MLflow tracking server
    Registry {
        tracking_uri: String,
        #[serde(default)]
        token: Option<String>,
        selection: RegistrySelection,
        #[serde(default = "default_registry_model_artifact")]
        model_artifact: String,
        #[serde(default = "default_registry_transformer_artifact")]
        transformer_artifact: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

/// How the registry picks "the latest" model
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RegistrySelection {
    /// Newest run of an experiment whose run name starts with a prefix
    LatestRun {
        experiment_name: String,
        #[serde(default = "default_run_name_prefix")]
        run_name_prefix: String,
    },
    /// Highest version of a registered model
    RegisteredModel { name: String },
}

impl Default for ArtifactSourceConfig {
    fn default() -> Self {
        Self::Local {
            dir: default_models_dir(),
            model_file: None,
            transformer_file: default_transformer_file(),
        }
    }
}

/// Artifact loading configuration for both slots
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub default: ArtifactSourceConfig,
    /// Falls back to the default slot's source when absent
    #[serde(default)]
    pub best_model: Option<ArtifactSourceConfig>,
    /// Load both slots at startup instead of on first use
    #[serde(default)]
    pub preload: bool,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_transformer_file() -> String {
    "transformer.json".to_string()
}

fn default_model_blob() -> String {
    "model.json".to_string()
}

fn default_registry_model_artifact() -> String {
    "best_model/model.json".to_string()
}

fn default_registry_transformer_artifact() -> String {
    "best_model/transformer.json".to_string()
}

fn default_run_name_prefix() -> String {
    DEFAULT_RUN_NAME_PREFIX.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
