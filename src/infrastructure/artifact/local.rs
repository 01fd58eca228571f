//! Artifacts read from a local directory

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;
use tracing::debug;

use crate::domain::artifact::{ArtifactSource, RawArtifacts};
use crate::domain::DomainError;

const FALLBACK_MODEL_FILE: &str = "model.json";

static MODEL_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<id>.+)_model\.json$").expect("valid model file pattern"));

/// Reads the model and transformer from a directory
#[derive(Debug, Clone)]
pub struct LocalArtifactSource {
    dir: PathBuf,
    model_file: Option<String>,
    transformer_file: String,
}

impl LocalArtifactSource {
    pub fn new(
        dir: impl Into<PathBuf>,
        model_file: Option<String>,
        transformer_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            model_file,
            transformer_file: transformer_file.into(),
        }
    }

    /// Pick the model file and the id encoded in its name, if any
    async fn resolve_model(&self) -> Result<(PathBuf, Option<String>), DomainError> {
        if let Some(file) = &self.model_file {
            return Ok((self.dir.join(file), model_id(file)));
        }

        if let Some((path, id)) = newest_model_file(&self.dir).await? {
            return Ok((path, Some(id)));
        }

        Ok((self.dir.join(FALLBACK_MODEL_FILE), None))
    }

    /// `<id>_transformer.json` next to an id-named model wins over the configured file
    async fn resolve_transformer(&self, model_id: Option<&str>) -> PathBuf {
        if let Some(id) = model_id {
            let paired = self.dir.join(format!("{}_transformer.json", id));
            if tokio::fs::try_exists(&paired).await.unwrap_or(false) {
                return paired;
            }
        }
        self.dir.join(&self.transformer_file)
    }
}

fn model_id(file_name: &str) -> Option<String> {
    MODEL_FILE_NAME
        .captures(file_name)
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str().to_string())
}

async fn newest_model_file(dir: &Path) -> Result<Option<(PathBuf, String)>, DomainError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DomainError::artifact(format!(
                "Model directory not found: {}",
                dir.display()
            )))
        }
        Err(e) => {
            return Err(DomainError::artifact(format!(
                "Failed to read model directory {}: {}",
                dir.display(),
                e
            )))
        }
    };

    let mut newest: Option<(SystemTime, String, PathBuf, String)> = None;

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        DomainError::artifact(format!("Failed to read model directory entry: {}", e))
    })? {
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(id) = model_id(&file_name) else {
            continue;
        };
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        // Ties on mtime resolve to the lexically greatest name
        let is_newer = match &newest {
            None => true,
            Some((t, name, _, _)) => (modified, &file_name) > (*t, name),
        };
        if is_newer {
            newest = Some((modified, file_name, entry.path(), id));
        }
    }

    Ok(newest.map(|(_, _, path, id)| (path, id)))
}

async fn read_artifact(path: &Path, what: &str) -> Result<Bytes, DomainError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Bytes::from(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DomainError::artifact(format!(
            "{} file not found: {}",
            what,
            path.display()
        ))),
        Err(e) => Err(DomainError::artifact(format!(
            "Failed to read {} file {}: {}",
            what.to_lowercase(),
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl ArtifactSource for LocalArtifactSource {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn describe(&self) -> String {
        format!("local:{}", self.dir.display())
    }

    async fn fetch(&self) -> Result<RawArtifacts, DomainError> {
        let (model_path, id) = self.resolve_model().await?;
        let transformer_path = self.resolve_transformer(id.as_deref()).await;

        debug!(
            model = %model_path.display(),
            transformer = %transformer_path.display(),
            "Reading local artifacts"
        );

        let model_bytes = read_artifact(&model_path, "Model").await?;
        let transformer_bytes = read_artifact(&transformer_path, "Transformer").await?;

        Ok(RawArtifacts {
            model_name: id,
            model_version: None,
            model_bytes,
            transformer_bytes,
            origin: model_path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn set_mtime(dir: &Path, name: &str, secs: u64) {
        let file = File::options().write(true).open(dir.join(name)).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_model_id_from_file_name() {
        assert_eq!(model_id("42_model.json").as_deref(), Some("42"));
        assert_eq!(model_id("xgb_v2_model.json").as_deref(), Some("xgb_v2"));
        assert_eq!(model_id("model.json"), None);
        assert_eq!(model_id("42_model.pkl"), None);
    }

    #[tokio::test]
    async fn test_newest_model_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1_model.json", "old");
        write(dir.path(), "2_model.json", "new");
        write(dir.path(), "transformer.json", "t");
        set_mtime(dir.path(), "1_model.json", 2_000);
        set_mtime(dir.path(), "2_model.json", 1_000);

        let source = LocalArtifactSource::new(dir.path(), None, "transformer.json");
        let raw = source.fetch().await.unwrap();

        assert_eq!(raw.model_name.as_deref(), Some("1"));
        assert_eq!(&raw.model_bytes[..], b"old");
        assert_eq!(&raw.transformer_bytes[..], b"t");
    }

    #[tokio::test]
    async fn test_paired_transformer_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "7_model.json", "m");
        write(dir.path(), "7_transformer.json", "paired");
        write(dir.path(), "transformer.json", "shared");

        let source = LocalArtifactSource::new(dir.path(), None, "transformer.json");
        let raw = source.fetch().await.unwrap();

        assert_eq!(&raw.transformer_bytes[..], b"paired");
    }

    #[tokio::test]
    async fn test_falls_back_to_model_json() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "model.json", "m");
        write(dir.path(), "transformer.json", "t");

        let source = LocalArtifactSource::new(dir.path(), None, "transformer.json");
        let raw = source.fetch().await.unwrap();

        assert!(raw.model_name.is_none());
        assert!(raw.origin.ends_with("model.json"));
    }

    #[tokio::test]
    async fn test_explicit_model_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "3_model.json", "three");
        write(dir.path(), "9_model.json", "nine");
        write(dir.path(), "transformer.json", "t");

        let source = LocalArtifactSource::new(
            dir.path(),
            Some("3_model.json".to_string()),
            "transformer.json",
        );
        let raw = source.fetch().await.unwrap();

        assert_eq!(raw.model_name.as_deref(), Some("3"));
        assert_eq!(&raw.model_bytes[..], b"three");
    }

    #[tokio::test]
    async fn test_missing_artifacts_are_artifact_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalArtifactSource::new(dir.path(), None, "transformer.json");

        let result = source.fetch().await;
        assert!(matches!(result, Err(DomainError::Artifact { .. })));

        let missing =
            LocalArtifactSource::new(dir.path().join("absent"), None, "transformer.json");
        let result = missing.fetch().await;
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
    }
}
