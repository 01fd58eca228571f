//! Lazily loaded, shared artifact handles

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::domain::artifact::{ArtifactBundle, ArtifactSlot, ArtifactSource};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_artifact_load;

/// Point-in-time view of a slot, as reported by the admin endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub slot: ArtifactSlot,
    pub source: String,
    pub source_type: &'static str,
    pub loaded: bool,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub n_features: Option<usize>,
    pub fingerprint: Option<String>,
    pub origin: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Holds the bundle of one slot.
///
/// The first `get` loads from the source; later calls return the cached
/// bundle until `reload`. Loads are serialized, so concurrent first requests
/// trigger a single fetch.
#[derive(Debug)]
pub struct ArtifactStore {
    slot: ArtifactSlot,
    source: Arc<dyn ArtifactSource>,
    current: RwLock<Option<Arc<ArtifactBundle>>>,
    last_error: RwLock<Option<String>>,
    load_lock: Mutex<()>,
}

impl ArtifactStore {
    pub fn new(slot: ArtifactSlot, source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            slot,
            source,
            current: RwLock::new(None),
            last_error: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// A store with a bundle already in place
    pub fn preloaded(
        slot: ArtifactSlot,
        source: Arc<dyn ArtifactSource>,
        bundle: ArtifactBundle,
    ) -> Self {
        let mut store = Self::new(slot, source);
        store.current = RwLock::new(Some(Arc::new(bundle)));
        store
    }

    pub fn slot(&self) -> ArtifactSlot {
        self.slot
    }

    pub fn source(&self) -> &Arc<dyn ArtifactSource> {
        &self.source
    }

    /// The cached bundle, without triggering a load
    pub async fn peek(&self) -> Option<Arc<ArtifactBundle>> {
        self.current.read().await.clone()
    }

    /// The cached bundle, loading it first if needed
    pub async fn get(&self) -> Result<Arc<ArtifactBundle>, DomainError> {
        if let Some(bundle) = self.peek().await {
            return Ok(bundle);
        }

        let _guard = self.load_lock.lock().await;

        // Another request may have finished loading while we waited
        if let Some(bundle) = self.peek().await {
            return Ok(bundle);
        }

        self.load().await
    }

    /// Fetch again and swap the bundle in. On failure the previous bundle
    /// keeps serving.
    pub async fn reload(&self) -> Result<Arc<ArtifactBundle>, DomainError> {
        let _guard = self.load_lock.lock().await;
        self.load().await
    }

    /// Caller must hold `load_lock`
    async fn load(&self) -> Result<Arc<ArtifactBundle>, DomainError> {
        let started = Instant::now();
        let result = self.fetch_bundle().await;
        record_artifact_load(self.slot, result.is_ok(), started.elapsed());

        match result {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                info!(
                    slot = %self.slot,
                    source = %self.source.describe(),
                    model = %bundle.model_name(),
                    version = %bundle.version_label(),
                    fingerprint = bundle.fingerprint().unwrap_or("-"),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Loaded model artifacts"
                );

                *self.current.write().await = Some(bundle.clone());
                *self.last_error.write().await = None;
                Ok(bundle)
            }
            Err(e) => {
                error!(
                    slot = %self.slot,
                    source = %self.source.describe(),
                    error = %e,
                    "Failed to load model artifacts"
                );
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_bundle(&self) -> Result<ArtifactBundle, DomainError> {
        let raw = self.source.fetch().await?;
        ArtifactBundle::from_raw(self.slot, raw)
    }

    pub async fn status(&self) -> ArtifactStatus {
        let bundle = self.peek().await;

        ArtifactStatus {
            slot: self.slot,
            source: self.source.describe(),
            source_type: self.source.kind(),
            loaded: bundle.is_some(),
            model_name: bundle.as_ref().map(|b| b.model_name().to_string()),
            model_version: bundle
                .as_ref()
                .and_then(|b| b.model_version().map(str::to_string)),
            n_features: bundle.as_ref().map(|b| b.n_features()),
            fingerprint: bundle
                .as_ref()
                .and_then(|b| b.fingerprint().map(str::to_string)),
            origin: bundle.as_ref().map(|b| b.origin().to_string()),
            loaded_at: bundle.as_ref().map(|b| b.loaded_at()),
            last_error: self.last_error.read().await.clone(),
        }
    }
}

/// The `default` and `best_model` stores
#[derive(Debug, Clone)]
pub struct ArtifactStores {
    default: Arc<ArtifactStore>,
    best_model: Arc<ArtifactStore>,
}

impl ArtifactStores {
    pub fn new(default: Arc<ArtifactStore>, best_model: Arc<ArtifactStore>) -> Self {
        Self {
            default,
            best_model,
        }
    }

    pub fn get(&self, slot: ArtifactSlot) -> &Arc<ArtifactStore> {
        match slot {
            ArtifactSlot::Default => &self.default,
            ArtifactSlot::BestModel => &self.best_model,
        }
    }

    /// Load every slot, failing on the first error
    pub async fn preload(&self) -> Result<(), DomainError> {
        for slot in ArtifactSlot::ALL {
            self.get(slot).get().await?;
        }
        Ok(())
    }

    pub async fn statuses(&self) -> Vec<ArtifactStatus> {
        let mut statuses = Vec::with_capacity(ArtifactSlot::ALL.len());
        for slot in ArtifactSlot::ALL {
            statuses.push(self.get(slot).status().await);
        }
        statuses
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::RawArtifacts;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl ArtifactSource for CountingSource {
        fn kind(&self) -> &'static str {
            "local"
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }

        async fn fetch(&self) -> Result<RawArtifacts, DomainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;

            if self.fail {
                return Err(DomainError::artifact("Model file not found: ./models/model.json"));
            }

            Ok(RawArtifacts {
                model_name: None,
                model_version: Some(call.to_string()),
                model_bytes: Bytes::from(
                    json!({"kind": "logistic_regression", "weights": [1.0], "intercept": 0.0})
                        .to_string(),
                ),
                transformer_bytes: Bytes::from(
                    json!({"columns": [{"type": "passthrough", "name": "tenure"}]}).to_string(),
                ),
                origin: "counting".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_load_once() {
        let source = CountingSource::new(false);
        let store = Arc::new(ArtifactStore::new(ArtifactSlot::Default, source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.get().await.map(|b| b.version_label().to_string())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "1");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_replaces_bundle() {
        let source = CountingSource::new(false);
        let store = ArtifactStore::new(ArtifactSlot::BestModel, source.clone());

        assert_eq!(store.get().await.unwrap().version_label(), "1");
        assert_eq!(store.reload().await.unwrap().version_label(), "2");
        assert_eq!(store.get().await.unwrap().version_label(), "2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let status = store.status().await;
        assert!(status.loaded);
        assert_eq!(status.model_name.as_deref(), Some("best_model"));
        assert_eq!(status.n_features, Some(1));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let source = CountingSource::new(true);
        let store = ArtifactStore::new(ArtifactSlot::Default, source.clone());

        assert!(matches!(store.get().await, Err(DomainError::Artifact { .. })));
        assert!(store.get().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let status = store.status().await;
        assert!(!status.loaded);
        assert!(status.last_error.unwrap().contains("Model file not found"));
    }
}
