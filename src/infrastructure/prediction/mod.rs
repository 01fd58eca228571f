//! Prediction infrastructure module

mod postgres_repository;
mod repository;
mod service;

pub use postgres_repository::{PostgresPredictionLogRepository, PostgresPredictionRepository};
pub use repository::{InMemoryPredictionLogRepository, InMemoryPredictionRepository};
pub use service::{PredictionService, ScoreOutcome, ScoreRequest, MAX_PAGE_SIZE};
