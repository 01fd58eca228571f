//! Prediction and prediction log entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// A persisted churn prediction. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub external_customer_id: Option<String>,
    pub user_id: Option<UserId>,
    pub model_id: Option<i64>,
    /// JSON snapshot of the record that was scored
    pub input_data: String,
    pub prediction: u8,
    pub probability: f64,
    pub created_at: DateTime<Utc>,
}

/// Values for a prediction row that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub external_customer_id: Option<String>,
    pub user_id: Option<UserId>,
    pub model_id: Option<i64>,
    pub input_data: String,
    pub prediction: u8,
    pub probability: f64,
}

impl NewPrediction {
    pub fn into_prediction(self, id: i64, created_at: DateTime<Utc>) -> Prediction {
        Prediction {
            id,
            external_customer_id: self.external_customer_id,
            user_id: self.user_id,
            model_id: self.model_id,
            input_data: self.input_data,
            prediction: self.prediction,
            probability: self.probability,
            created_at,
        }
    }
}

/// Request metadata recorded alongside each prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLog {
    pub id: i64,
    pub prediction_id: i64,
    pub user_id: Option<UserId>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPredictionLog {
    pub prediction_id: i64,
    pub user_id: Option<UserId>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl NewPredictionLog {
    pub fn into_log(self, id: i64, timestamp: DateTime<Utc>) -> PredictionLog {
        PredictionLog {
            id,
            prediction_id: self.prediction_id,
            user_id: self.user_id,
            request_ip: self.request_ip,
            user_agent: self.user_agent,
            timestamp,
        }
    }
}
