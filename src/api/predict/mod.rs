//! Scoring endpoints

use axum::{extract::State, routing::post, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::middleware::{RequestMeta, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::artifact::{ArtifactSlot, FeatureRecord};
use crate::infrastructure::prediction::ScoreRequest;

pub fn create_predict_router() -> Router<AppState> {
    Router::new()
        .route("/predict/", post(predict))
        .route("/predict", post(predict))
        .route("/predict/best_model", post(predict_best_model))
        .route(
            "/predict/predict-from-call-session/",
            post(predict_from_call_session),
        )
        .route(
            "/predict/predict-from-call-session",
            post(predict_from_call_session),
        )
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub user: String,
    pub prediction: u8,
    pub probability: f64,
    pub prediction_id: i64,
    pub model_version: String,
}

/// Body of the call-session endpoint
#[derive(Debug, Deserialize)]
pub struct CallSessionRequest {
    /// String or number; required
    #[serde(default)]
    pub customer_id: Option<Value>,
    #[serde(default)]
    pub data: FeatureRecord,
}

#[derive(Debug, Serialize)]
pub struct CallSessionResponse {
    pub external_customer_id: String,
    pub prediction: u8,
    pub probability: f64,
    pub prediction_id: i64,
    pub model_version: String,
}

async fn score_for_user(
    state: &AppState,
    slot: ArtifactSlot,
    user: &crate::domain::user::User,
    meta: RequestMeta,
    record: FeatureRecord,
) -> Result<PredictResponse, ApiError> {
    let outcome = state
        .prediction_service
        .score(ScoreRequest {
            slot,
            record,
            user_id: Some(user.id()),
            external_customer_id: None,
            request_ip: meta.ip,
            user_agent: meta.user_agent,
        })
        .await?;

    Ok(PredictResponse {
        user: user.username().to_string(),
        prediction: outcome.prediction.prediction,
        probability: outcome.prediction.probability,
        prediction_id: outcome.prediction.id,
        model_version: outcome.model_version,
    })
}

/// POST /predict/
pub async fn predict(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    meta: RequestMeta,
    Json(record): Json<FeatureRecord>,
) -> Result<Json<PredictResponse>, ApiError> {
    score_for_user(&state, ArtifactSlot::Default, &user, meta, record)
        .await
        .map(Json)
}

/// POST /predict/best_model
pub async fn predict_best_model(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    meta: RequestMeta,
    Json(record): Json<FeatureRecord>,
) -> Result<Json<PredictResponse>, ApiError> {
    score_for_user(&state, ArtifactSlot::BestModel, &user, meta, record)
        .await
        .map(Json)
}

fn customer_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// POST /predict/predict-from-call-session/
///
/// Unauthenticated; the prediction is attributed to an external customer id.
pub async fn predict_from_call_session(
    State(state): State<AppState>,
    meta: RequestMeta,
    Json(request): Json<CallSessionRequest>,
) -> Result<Json<CallSessionResponse>, ApiError> {
    let external_customer_id = customer_id(request.customer_id)
        .ok_or_else(|| ApiError::bad_request("Missing customer_id").with_param("customer_id"))?;

    let outcome = state
        .prediction_service
        .score(ScoreRequest {
            slot: ArtifactSlot::Default,
            record: request.data,
            user_id: None,
            external_customer_id: Some(external_customer_id.clone()),
            request_ip: meta.ip,
            user_agent: meta.user_agent,
        })
        .await?;

    Ok(Json(CallSessionResponse {
        external_customer_id,
        prediction: outcome.prediction.prediction,
        probability: outcome.prediction.probability,
        prediction_id: outcome.prediction.id,
        model_version: outcome.model_version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_customer_id_forms() {
        assert_eq!(customer_id(Some(json!("CUST-9"))).as_deref(), Some("CUST-9"));
        assert_eq!(customer_id(Some(json!(42))).as_deref(), Some("42"));
        assert_eq!(customer_id(Some(json!("  "))), None);
        assert_eq!(customer_id(Some(Value::Null)), None);
        assert_eq!(customer_id(None), None);
    }
}
