//! Authentication API endpoints
//!
//! Registration, token issuance and the current-user lookup.

use axum::{
    extract::{FromRequest, Request, State},
    http::header,
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::user::{User, UserProfile, UserRole};
use crate::infrastructure::user::RegisterUserRequest;

pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_current_user))
}

/// Registration body. A `role` field, if sent, is ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 100))]
    pub team: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// User response (safe to expose)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub team: Option<String>,
    pub address: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        let profile = user.profile();

        Self {
            id: user.id().to_string(),
            username: user.username().to_string(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            full_name: profile.full_name.clone(),
            team: profile.team.clone(),
            address: profile.address.clone(),
            role: user.role(),
            is_active: user.is_active(),
            created_at: user.created_at(),
        }
    }
}

/// Credentials from either a JSON body or an OAuth2 password form
#[derive(Debug)]
pub struct LoginCredentials(pub LoginRequest);

impl<S> FromRequest<S> for LoginCredentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(request) = Form::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?;
            return Ok(Self(request));
        }

        match Json::<LoginRequest>::from_request(req, state).await {
            Ok(Json(request)) => Ok(Self(request)),
            Err(rejection) => Err(ApiError::bad_request(rejection.message())),
        }
    }
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: request.username,
            password: request.password,
            profile: UserProfile {
                email: request.email,
                phone: request.phone,
                full_name: request.full_name,
                team: request.team,
                address: request.address,
            },
        })
        .await?;

    info!(user_id = %user.id(), username = %user.username(), "Registered user");
    Ok(Json(UserResponse::from(&user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    LoginCredentials(request): LoginCredentials,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(&request.username, &request.password)
        .await?
        .ok_or_else(|| {
            warn!(username = %request.username, "Rejected login");
            ApiError::unauthorized("Incorrect username or password")
        })?;

    let issued = state.jwt_service.generate(&user)?;

    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer",
        expires_at: issued.expires_at,
    }))
}

/// GET /auth/me
pub async fn get_current_user(RequireUser(user): RequireUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}
