//! Domain layer - Core business logic and entities

pub mod artifact;
pub mod error;
pub mod feedback;
pub mod ml_model;
pub mod prediction;
pub mod user;

pub use artifact::{
    ArtifactBundle, ArtifactSlot, ArtifactSource, Classifier, FeatureRecord, FeatureTransformer,
    RawArtifacts, Score,
};
pub use error::DomainError;
pub use feedback::{Feedback, FeedbackRepository, NewFeedback};
pub use ml_model::{MlModel, MlModelRepository, NewMlModel};
pub use prediction::{
    NewPrediction, NewPredictionLog, Prediction, PredictionLog, PredictionLogRepository,
    PredictionRepository,
};
pub use user::{User, UserId, UserProfile, UserRepository, UserRole};
