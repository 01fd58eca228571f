//! Application state for shared services

use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::feedback::{Feedback, FeedbackRepository, NewFeedback};
use crate::domain::ml_model::MlModelRepository;
use crate::domain::prediction::{Prediction, PredictionLogRepository, PredictionRepository};
use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::artifact::ArtifactStores;
use crate::infrastructure::auth::JwtGenerator;
use crate::infrastructure::feedback::FeedbackService;
use crate::infrastructure::prediction::{PredictionService, ScoreOutcome, ScoreRequest};
use crate::infrastructure::user::{PasswordHasher, RegisterUserRequest, UserService};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServiceTrait>,
    pub jwt_service: Arc<dyn JwtGenerator>,
    pub prediction_service: Arc<dyn PredictionServiceTrait>,
    pub feedback_service: Arc<dyn FeedbackServiceTrait>,
    pub ml_models: Arc<dyn MlModelRepository>,
    pub artifacts: ArtifactStores,
    /// Pool probed by `/ready`; absent with the in-memory backend
    pub database: Option<PgPool>,
}

#[async_trait::async_trait]
pub trait UserServiceTrait: Send + Sync {
    async fn register(&self, request: RegisterUserRequest) -> Result<User, DomainError>;
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<Option<User>, DomainError>;
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;
}

#[async_trait::async_trait]
pub trait PredictionServiceTrait: Send + Sync {
    async fn score(&self, request: ScoreRequest) -> Result<ScoreOutcome, DomainError>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Prediction>, DomainError>;
    async fn get(&self, id: i64) -> Result<Prediction, DomainError>;
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
}

#[async_trait::async_trait]
pub trait FeedbackServiceTrait: Send + Sync {
    async fn create(&self, feedback: NewFeedback) -> Result<Feedback, DomainError>;
    async fn list_for_prediction(&self, prediction_id: i64) -> Result<Vec<Feedback>, DomainError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Feedback>, DomainError>;
}

#[async_trait::async_trait]
impl<R, H> UserServiceTrait for UserService<R, H>
where
    R: UserRepository + 'static,
    H: PasswordHasher + 'static,
{
    async fn register(&self, request: RegisterUserRequest) -> Result<User, DomainError> {
        UserService::register(self, request).await
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        UserService::authenticate(self, username, password).await
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        UserService::get(self, id).await
    }
}

#[async_trait::async_trait]
impl<P, L, F, M> PredictionServiceTrait for PredictionService<P, L, F, M>
where
    P: PredictionRepository + 'static,
    L: PredictionLogRepository + 'static,
    F: FeedbackRepository + 'static,
    M: MlModelRepository + 'static,
{
    async fn score(&self, request: ScoreRequest) -> Result<ScoreOutcome, DomainError> {
        PredictionService::score(self, request).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Prediction>, DomainError> {
        PredictionService::list(self, limit, offset).await
    }

    async fn get(&self, id: i64) -> Result<Prediction, DomainError> {
        PredictionService::get(self, id).await
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        PredictionService::delete(self, id).await
    }
}

#[async_trait::async_trait]
impl<F, P> FeedbackServiceTrait for FeedbackService<F, P>
where
    F: FeedbackRepository + 'static,
    P: PredictionRepository + 'static,
{
    async fn create(&self, feedback: NewFeedback) -> Result<Feedback, DomainError> {
        FeedbackService::create(self, feedback).await
    }

    async fn list_for_prediction(&self, prediction_id: i64) -> Result<Vec<Feedback>, DomainError> {
        FeedbackService::list_for_prediction(self, prediction_id).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Feedback>, DomainError> {
        FeedbackService::list_for_user(self, user_id).await
    }
}
