//! Feedback endpoints

use axum::{extract::State, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::feedback::{Feedback, NewFeedback};

pub fn create_feedback_router() -> Router<AppState> {
    Router::new()
        .route("/feedback/", get(list_my_feedback).post(create_feedback))
        .route("/feedback", get(list_my_feedback).post(create_feedback))
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    pub prediction_id: i64,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: i64,
    pub prediction_id: i64,
    pub user_id: String,
    pub correct: Option<bool>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackResponse {
    fn from(f: Feedback) -> Self {
        Self {
            id: f.id,
            prediction_id: f.prediction_id,
            user_id: f.user_id.to_string(),
            correct: f.correct,
            comment: f.comment,
            created_at: f.created_at,
        }
    }
}

/// POST /feedback/
pub async fn create_feedback(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateFeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let feedback = state
        .feedback_service
        .create(NewFeedback {
            prediction_id: request.prediction_id,
            user_id: user.id(),
            correct: request.correct,
            comment: request.comment,
        })
        .await?;

    info!(
        feedback_id = feedback.id,
        prediction_id = feedback.prediction_id,
        user_id = %user.id(),
        "Recorded feedback"
    );
    Ok(Json(feedback.into()))
}

/// GET /feedback/
pub async fn list_my_feedback(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<FeedbackResponse>>, ApiError> {
    let feedback = state.feedback_service.list_for_user(&user.id()).await?;
    Ok(Json(feedback.into_iter().map(Into::into).collect()))
}
