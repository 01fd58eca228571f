//! Artifact loader administration

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, Path};
use crate::domain::artifact::ArtifactSlot;
use crate::infrastructure::artifact::ArtifactStatus;

pub fn create_artifacts_router() -> Router<AppState> {
    Router::new()
        .route("/artifacts/", get(list_artifacts))
        .route("/artifacts", get(list_artifacts))
        .route("/artifacts/{slot}/reload", post(reload_artifacts))
}

/// GET /artifacts/
pub async fn list_artifacts(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Json<Vec<ArtifactStatus>> {
    Json(state.artifacts.statuses().await)
}

/// POST /artifacts/{slot}/reload
///
/// A failed reload leaves the previously loaded bundle in service.
pub async fn reload_artifacts(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(slot): Path<String>,
) -> Result<Json<ArtifactStatus>, ApiError> {
    let slot = ArtifactSlot::parse(&slot)
        .ok_or_else(|| ApiError::not_found(format!("Unknown artifact slot '{}'", slot)))?;

    let store = state.artifacts.get(slot);
    store.reload().await?;

    info!(slot = %slot, admin = %admin.username(), "Reloaded artifacts on request");
    Ok(Json(store.status().await))
}
