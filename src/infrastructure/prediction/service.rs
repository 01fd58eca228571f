//! Prediction service - scoring, persistence and cleanup of predictions

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::artifact::{ArtifactSlot, FeatureRecord};
use crate::domain::feedback::FeedbackRepository;
use crate::domain::ml_model::{MlModelRepository, NewMlModel};
use crate::domain::prediction::{
    NewPrediction, NewPredictionLog, Prediction, PredictionLogRepository, PredictionRepository,
};
use crate::domain::user::UserId;
use crate::domain::DomainError;
use crate::infrastructure::artifact::ArtifactStores;
use crate::infrastructure::observability::record_prediction;

/// Largest page `list` returns
pub const MAX_PAGE_SIZE: usize = 1000;

/// One record to score, with the caller and request metadata to log
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub slot: ArtifactSlot,
    pub record: FeatureRecord,
    pub user_id: Option<UserId>,
    pub external_customer_id: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub prediction: Prediction,
    pub model_version: String,
}

#[derive(Debug)]
pub struct PredictionService<P, L, F, M>
where
    P: PredictionRepository,
    L: PredictionLogRepository,
    F: FeedbackRepository,
    M: MlModelRepository,
{
    predictions: Arc<P>,
    logs: Arc<L>,
    feedback: Arc<F>,
    models: Arc<M>,
    artifacts: ArtifactStores,
}

impl<P, L, F, M> PredictionService<P, L, F, M>
where
    P: PredictionRepository,
    L: PredictionLogRepository,
    F: FeedbackRepository,
    M: MlModelRepository,
{
    pub fn new(
        predictions: Arc<P>,
        logs: Arc<L>,
        feedback: Arc<F>,
        models: Arc<M>,
        artifacts: ArtifactStores,
    ) -> Self {
        Self {
            predictions,
            logs,
            feedback,
            models,
            artifacts,
        }
    }

    /// Score a record with the slot's bundle and persist the prediction and its log.
    ///
    /// The model lookup, the prediction insert and the log insert are separate
    /// statements; a failure part way leaves the earlier rows in place.
    pub async fn score(&self, request: ScoreRequest) -> Result<ScoreOutcome, DomainError> {
        let bundle = self.artifacts.get(request.slot).get().await?;

        let started = Instant::now();
        let score = bundle.score(&request.record)?;
        record_prediction(bundle.model_name(), score.label, started.elapsed());

        let model = self
            .models
            .find_or_create(NewMlModel::auto_created(
                bundle.model_name(),
                bundle.model_version(),
            ))
            .await?;

        let input_data = serde_json::to_string(&request.record)
            .map_err(|e| DomainError::internal(format!("Failed to serialize input: {}", e)))?;

        let prediction = self
            .predictions
            .create(NewPrediction {
                external_customer_id: request.external_customer_id,
                user_id: request.user_id,
                model_id: Some(model.id),
                input_data,
                prediction: score.label,
                probability: score.probability,
            })
            .await?;

        self.logs
            .create(NewPredictionLog {
                prediction_id: prediction.id,
                user_id: request.user_id,
                request_ip: request.request_ip,
                user_agent: request.user_agent,
            })
            .await?;

        info!(
            prediction_id = prediction.id,
            slot = %request.slot,
            model = %bundle.model_name(),
            label = score.label,
            probability = score.probability,
            "Stored prediction"
        );

        Ok(ScoreOutcome {
            prediction,
            model_version: bundle.version_label().to_string(),
        })
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Prediction>, DomainError> {
        self.predictions
            .list(limit.min(MAX_PAGE_SIZE), offset)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Prediction, DomainError> {
        self.predictions
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Prediction not found"))
    }

    /// Delete a prediction after its feedback and its log
    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.get(id).await?;

        let feedback = self.feedback.delete_by_prediction(id).await?;
        let logs = self.logs.delete_by_prediction(id).await?;
        debug!(prediction_id = id, feedback, logs, "Removed prediction dependents");

        if !self.predictions.delete(id).await? {
            return Err(DomainError::not_found("Prediction not found"));
        }

        info!(prediction_id = id, "Deleted prediction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::mock::UnavailableArtifactSource;
    use crate::domain::feedback::{MockFeedbackRepository, NewFeedback};
    use crate::domain::prediction::{MockPredictionLogRepository, MockPredictionRepository};
    use crate::infrastructure::artifact::mock::{stub_stores, unloaded_stores};
    use crate::infrastructure::feedback::InMemoryFeedbackRepository;
    use crate::infrastructure::ml_model::InMemoryMlModelRepository;
    use crate::infrastructure::prediction::{
        InMemoryPredictionLogRepository, InMemoryPredictionRepository,
    };
    use chrono::Utc;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use serde_json::json;

    type InMemoryService = PredictionService<
        InMemoryPredictionRepository,
        InMemoryPredictionLogRepository,
        InMemoryFeedbackRepository,
        InMemoryMlModelRepository,
    >;

    struct Fixture {
        service: InMemoryService,
        logs: Arc<InMemoryPredictionLogRepository>,
        feedback: Arc<InMemoryFeedbackRepository>,
        models: Arc<InMemoryMlModelRepository>,
    }

    fn fixture(artifacts: ArtifactStores) -> Fixture {
        let logs = Arc::new(InMemoryPredictionLogRepository::new());
        let feedback = Arc::new(InMemoryFeedbackRepository::new());
        let models = Arc::new(InMemoryMlModelRepository::new());
        let service = PredictionService::new(
            Arc::new(InMemoryPredictionRepository::new()),
            logs.clone(),
            feedback.clone(),
            models.clone(),
            artifacts,
        );

        Fixture {
            service,
            logs,
            feedback,
            models,
        }
    }

    fn request(slot: ArtifactSlot) -> ScoreRequest {
        ScoreRequest {
            slot,
            record: json!({"tenure": 3, "monthly_charges": 99.5})
                .as_object()
                .cloned()
                .unwrap(),
            user_id: Some(UserId::generate()),
            external_customer_id: None,
            request_ip: Some("10.0.0.8".to_string()),
            user_agent: Some("pytest".to_string()),
        }
    }

    #[tokio::test]
    async fn test_score_persists_prediction_log_and_model() {
        let f = fixture(stub_stores());
        let req = request(ArtifactSlot::Default);
        let user_id = req.user_id;

        let outcome = f.service.score(req).await.unwrap();
        assert_eq!(outcome.prediction.prediction, 1);
        assert_eq!(outcome.prediction.probability, 0.7);
        assert_eq!(outcome.model_version, "1");
        assert_eq!(outcome.prediction.user_id, user_id);

        let stored: serde_json::Value =
            serde_json::from_str(&outcome.prediction.input_data).unwrap();
        assert_eq!(stored["tenure"], 3);

        let log = f
            .logs
            .get_by_prediction(outcome.prediction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.request_ip.as_deref(), Some("10.0.0.8"));
        assert_eq!(log.user_agent.as_deref(), Some("pytest"));

        let models = f.models.list().await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "model");
        assert_eq!(outcome.prediction.model_id, Some(models[0].id));
    }

    #[tokio::test]
    async fn test_duplicate_submissions_create_duplicate_rows() {
        let f = fixture(stub_stores());

        let first = f.service.score(request(ArtifactSlot::BestModel)).await.unwrap();
        let second = f.service.score(request(ArtifactSlot::BestModel)).await.unwrap();

        assert_ne!(first.prediction.id, second.prediction.id);
        assert_eq!(first.prediction.model_id, second.prediction.model_id);
        assert_eq!(second.model_version, "7");
        assert_eq!(f.service.list(10, 0).await.unwrap().len(), 2);
        assert_eq!(f.models.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unloaded_artifacts_write_nothing() {
        let f = fixture(unloaded_stores(Arc::new(UnavailableArtifactSource::missing())));

        let result = f.service.score(request(ArtifactSlot::Default)).await;
        assert!(matches!(result, Err(DomainError::Artifact { .. })));
        assert!(f.service.list(10, 0).await.unwrap().is_empty());
        assert!(f.models.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_record_is_a_validation_error() {
        let f = fixture(stub_stores());
        let mut req = request(ArtifactSlot::Default);
        req.record = json!({"tenure": "long", "monthly_charges": 10})
            .as_object()
            .cloned()
            .unwrap();

        let result = f.service.score(req).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_delete_removes_feedback_then_prediction() {
        let f = fixture(stub_stores());
        let outcome = f.service.score(request(ArtifactSlot::Default)).await.unwrap();
        let id = outcome.prediction.id;

        f.feedback
            .create(NewFeedback {
                prediction_id: id,
                user_id: UserId::generate(),
                correct: Some(true),
                comment: None,
            })
            .await
            .unwrap();

        f.service.delete(id).await.unwrap();

        assert!(matches!(
            f.service.get(id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(f.feedback.list_by_prediction(id).await.unwrap().is_empty());
        assert!(f.logs.get_by_prediction(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_prediction() {
        let f = fixture(stub_stores());
        let result = f.service.delete(404).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_order() {
        let mut seq = Sequence::new();
        let mut predictions = MockPredictionRepository::new();
        let mut logs = MockPredictionLogRepository::new();
        let mut feedback = MockFeedbackRepository::new();

        predictions
            .expect_get()
            .with(eq(5))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| {
                Ok(Some(Prediction {
                    id,
                    external_customer_id: Some("CUST-5".to_string()),
                    user_id: None,
                    model_id: None,
                    input_data: "{}".to_string(),
                    prediction: 0,
                    probability: 0.1,
                    created_at: Utc::now(),
                }))
            });
        feedback
            .expect_delete_by_prediction()
            .with(eq(5))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(2));
        logs.expect_delete_by_prediction()
            .with(eq(5))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));
        predictions
            .expect_delete()
            .with(eq(5))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));

        let service = PredictionService::new(
            Arc::new(predictions),
            Arc::new(logs),
            Arc::new(feedback),
            Arc::new(InMemoryMlModelRepository::new()),
            stub_stores(),
        );

        service.delete(5).await.unwrap();
    }
}
