//! Prediction domain - scored records and their request logs

mod entity;
mod repository;

pub use entity::{NewPrediction, NewPredictionLog, Prediction, PredictionLog};
pub use repository::{PredictionLogRepository, PredictionRepository};

#[cfg(test)]
pub use repository::{MockPredictionLogRepository, MockPredictionRepository};
