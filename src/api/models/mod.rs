//! MLModel record endpoints

use axum::{extract::State, routing::get, Router};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::api::middleware::{RequireAdmin, RequireUser};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::ml_model::{MlModel, NewMlModel, UNKNOWN_MODEL_VERSION};

pub fn create_models_router() -> Router<AppState> {
    Router::new()
        .route("/models/", get(list_models).post(create_model))
        .route("/models", get(list_models).post(create_model))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateModelRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub version: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// GET /models/
pub async fn list_models(
    State(state): State<AppState>,
    _user: RequireUser,
) -> Result<Json<Vec<MlModel>>, ApiError> {
    Ok(Json(state.ml_models.list().await?))
}

/// POST /models/
pub async fn create_model(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateModelRequest>,
) -> Result<Json<MlModel>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let model = state
        .ml_models
        .create(NewMlModel {
            name: request.name,
            version: request
                .version
                .unwrap_or_else(|| UNKNOWN_MODEL_VERSION.to_string()),
            description: request.description,
        })
        .await?;

    info!(
        model_id = model.id,
        name = %model.name,
        admin = %admin.username(),
        "Created MLModel record"
    );
    Ok(Json(model))
}
