//! Churn Prediction Service
//!
//! HTTP scoring service for customer churn models with:
//! - Token-authenticated scoring and call-session scoring
//! - Local, blob-store and tracking-server model artifacts
//! - Prediction history, audit logs and analyst feedback
//! - PostgreSQL or in-memory persistence

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::{
    FeedbackRepository, MlModelRepository, PredictionLogRepository, PredictionRepository,
    UserRepository,
};
use infrastructure::{
    artifact::{ArtifactSourceFactory, ArtifactStores},
    auth::{JwtConfig, JwtGenerator, JwtService},
    feedback::{FeedbackService, InMemoryFeedbackRepository, PostgresFeedbackRepository},
    ml_model::{InMemoryMlModelRepository, PostgresMlModelRepository},
    prediction::{
        InMemoryPredictionLogRepository, InMemoryPredictionRepository,
        PostgresPredictionLogRepository, PostgresPredictionRepository, PredictionService,
    },
    storage::{
        connect_pool, ping, resolve_database_url, run_schema_migrations, PostgresConfig,
        StorageBackend,
    },
    user::{Argon2Hasher, InMemoryUserRepository, PostgresUserRepository, UserService},
};
use rand::Rng;
use sqlx::PgPool;
use tracing::{info, warn};

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let jwt_service = create_jwt_service(config);
    let artifacts = ArtifactSourceFactory::create_stores(&config.artifacts)?;

    let backend = config.storage.backend;
    info!("Storage backend: {}", backend.as_str());

    let state = match backend {
        StorageBackend::Postgres => {
            let pool = connect_database(config).await?;

            let (state, users) = assemble_state(
                Arc::new(PostgresUserRepository::new(pool.clone())),
                Arc::new(PostgresPredictionRepository::new(pool.clone())),
                Arc::new(PostgresPredictionLogRepository::new(pool.clone())),
                Arc::new(PostgresFeedbackRepository::new(pool.clone())),
                Arc::new(PostgresMlModelRepository::new(pool.clone())),
                jwt_service,
                artifacts,
                Some(pool),
            );
            create_initial_admin_user(&users, &config.auth.admin_username).await?;
            state
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");

            let (state, users) = create_in_memory_state(jwt_service, artifacts);
            create_initial_admin_user(&users, &config.auth.admin_username).await?;
            state
        }
    };

    if config.artifacts.preload {
        info!("Preloading model artifacts");
        state.artifacts.preload().await?;
    }

    Ok(state)
}

/// Application state backed entirely by in-memory repositories.
///
/// The concrete user service is returned alongside so callers can seed accounts.
pub fn create_in_memory_state(
    jwt_service: Arc<dyn JwtGenerator>,
    artifacts: ArtifactStores,
) -> (
    AppState,
    Arc<UserService<InMemoryUserRepository, Argon2Hasher>>,
) {
    assemble_state(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryPredictionRepository::new()),
        Arc::new(InMemoryPredictionLogRepository::new()),
        Arc::new(InMemoryFeedbackRepository::new()),
        Arc::new(InMemoryMlModelRepository::new()),
        jwt_service,
        artifacts,
        None,
    )
}

#[allow(clippy::too_many_arguments)]
fn assemble_state<U, P, L, F, M>(
    users: Arc<U>,
    predictions: Arc<P>,
    logs: Arc<L>,
    feedback: Arc<F>,
    models: Arc<M>,
    jwt_service: Arc<dyn JwtGenerator>,
    artifacts: ArtifactStores,
    database: Option<PgPool>,
) -> (AppState, Arc<UserService<U, Argon2Hasher>>)
where
    U: UserRepository + 'static,
    P: PredictionRepository + 'static,
    L: PredictionLogRepository + 'static,
    F: FeedbackRepository + 'static,
    M: MlModelRepository + 'static,
{
    let user_service = Arc::new(UserService::new(users, Arc::new(Argon2Hasher::new())));

    let prediction_service = Arc::new(PredictionService::new(
        predictions.clone(),
        logs,
        feedback.clone(),
        models.clone(),
        artifacts.clone(),
    ));

    let feedback_service = Arc::new(FeedbackService::new(feedback, predictions));

    let state = AppState {
        user_service: user_service.clone(),
        jwt_service,
        prediction_service,
        feedback_service,
        ml_models: models,
        artifacts,
        database,
    };

    (state, user_service)
}

/// Connect to PostgreSQL, fail fast when it is unreachable, and bring the schema up to date
async fn connect_database(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = resolve_database_url(config.database.url.as_deref(), &config.database.secrets_dir)?;

    info!("Connecting to PostgreSQL...");
    let pool = connect_pool(
        &PostgresConfig::new(url).with_max_connections(config.database.max_connections),
    )
    .await?;
    ping(&pool).await?;
    info!("PostgreSQL connection established");

    if config.database.run_migrations {
        run_schema_migrations(&pool).await?;
    }

    Ok(pool)
}

fn generate_random_string(len: usize) -> String {
    use rand::distributions::Alphanumeric;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Create JWT service from secret (config, env var, or random)
fn create_jwt_service(config: &AppConfig) -> Arc<dyn JwtGenerator> {
    let jwt_secret = config
        .auth
        .jwt_secret
        .clone()
        .or_else(|| std::env::var("JWT_SECRET").ok())
        .filter(|secret| !secret.is_empty())
        .unwrap_or_else(|| {
            warn!(
                "No JWT_SECRET configured. Generating random secret. \
                Tokens will NOT survive a restart."
            );
            generate_random_string(64)
        });

    Arc::new(JwtService::new(JwtConfig::new(
        jwt_secret,
        config.auth.token_expire_minutes,
    )))
}

/// Create the admin account unless it already exists
async fn create_initial_admin_user<U: UserRepository>(
    user_service: &UserService<U, Argon2Hasher>,
    username: &str,
) -> anyhow::Result<()> {
    let (password, is_default) = match std::env::var("ADMIN_DEFAULT_PASSWORD") {
        Ok(p) if !p.is_empty() => (p, true),
        _ => (generate_random_string(16), false),
    };

    if !user_service.ensure_admin(username, &password).await? {
        return Ok(());
    }

    info!("===========================================");
    info!("Initial admin user created!");
    info!("Username: {}", username);

    if is_default {
        info!("Password: (set via ADMIN_DEFAULT_PASSWORD)");
    } else {
        info!("Password: {}", password);
    }

    info!("===========================================");

    Ok(())
}
