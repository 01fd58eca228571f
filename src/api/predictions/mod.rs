//! Stored prediction endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::feedback::FeedbackResponse;
use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, Path, Query};
use crate::domain::prediction::Prediction;

const DEFAULT_PAGE_SIZE: usize = 100;

pub fn create_predictions_router() -> Router<AppState> {
    Router::new()
        .route("/predictions/", get(list_predictions))
        .route("/predictions", get(list_predictions))
        .route(
            "/predictions/{id}",
            get(get_prediction).delete(delete_prediction),
        )
        .route("/predictions/{id}/feedback", get(list_prediction_feedback))
}

#[derive(Debug, Deserialize)]
pub struct ListPredictionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default, alias = "skip")]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: i64,
    pub external_customer_id: Option<String>,
    pub user_id: Option<String>,
    pub model_id: Option<i64>,
    pub input_data: String,
    pub prediction: u8,
    pub probability: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Prediction> for PredictionResponse {
    fn from(p: Prediction) -> Self {
        Self {
            id: p.id,
            external_customer_id: p.external_customer_id,
            user_id: p.user_id.map(|id| id.to_string()),
            model_id: p.model_id,
            input_data: p.input_data,
            prediction: p.prediction,
            probability: p.probability,
            created_at: p.created_at,
        }
    }
}

/// GET /predictions/
///
/// Predictions are not scoped to the caller.
pub async fn list_predictions(
    State(state): State<AppState>,
    _user: RequireUser,
    Query(query): Query<ListPredictionsQuery>,
) -> Result<Json<Vec<PredictionResponse>>, ApiError> {
    let predictions = state
        .prediction_service
        .list(query.limit, query.offset)
        .await?;

    Ok(Json(predictions.into_iter().map(Into::into).collect()))
}

/// GET /predictions/{id}
pub async fn get_prediction(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let prediction = state.prediction_service.get(id).await?;
    Ok(Json(prediction.into()))
}

/// DELETE /predictions/{id}
pub async fn delete_prediction(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.prediction_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /predictions/{id}/feedback
pub async fn list_prediction_feedback(
    State(state): State<AppState>,
    _user: RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<FeedbackResponse>>, ApiError> {
    let feedback = state.feedback_service.list_for_prediction(id).await?;
    Ok(Json(feedback.into_iter().map(Into::into).collect()))
}
