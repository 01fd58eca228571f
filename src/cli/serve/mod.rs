//! Serve command - runs the HTTP API

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::api::create_router_with_state;
use crate::api::state::AppState;
use crate::config::{AppConfig, ServerConfig};
use crate::infrastructure::logging;
use crate::infrastructure::observability::{
    create_metrics_router, init_metrics, MetricsConfig, PrometheusMetrics,
};

/// Run the API server
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let (app, _) = build_app(&config).await?;

    let addr = build_socket_addr(&config.server)?;
    info!("Starting API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn build_socket_addr(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        server.host.parse::<std::net::IpAddr>()?,
        server.port,
    )))
}

/// Metrics recorder first, then state (including any artifact preload), then the router
async fn build_app(config: &AppConfig) -> anyhow::Result<(Router, Option<PrometheusMetrics>)> {
    let metrics = init_metrics(&config.observability.metrics);
    let state = crate::create_app_state_with_config(config).await?;
    let app = create_api_router(state, metrics.clone(), &config.observability.metrics);

    Ok((app, metrics))
}

/// API router plus the metrics endpoint when enabled
fn create_api_router(
    state: AppState,
    metrics: Option<PrometheusMetrics>,
    config: &MetricsConfig,
) -> Router {
    let router = create_router_with_state(state);

    match metrics {
        Some(m) => router.merge(create_metrics_router(m, &config.path)),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::infrastructure::artifact::ArtifactSourceConfig;
    use crate::infrastructure::storage::StorageBackend;

    #[tokio::test]
    async fn test_preload_samples_reach_metrics_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("model.json"),
            r#"{"kind": "logistic_regression", "weights": [0.5, 0.5], "intercept": -1.0}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("transformer.json"),
            r#"{"columns": [
                {"type": "numeric", "name": "tenure", "mean": 0.0, "scale": 1.0},
                {"type": "passthrough", "name": "senior_citizen"}
            ]}"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.auth.jwt_secret = Some("serve-test-secret".to_string());
        config.artifacts.preload = true;
        config.artifacts.default = ArtifactSourceConfig::Local {
            dir: dir.path().to_path_buf(),
            model_file: None,
            transformer_file: "transformer.json".to_string(),
        };

        let (app, metrics) = build_app(&config).await.unwrap();
        assert!(metrics.is_some());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("churn_artifact_loads_total"));
    }


    #[test]
    fn test_build_socket_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        assert_eq!(
            build_socket_addr(&server).unwrap(),
            "127.0.0.1:8000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_build_socket_addr_rejects_hostname() {
        let server = ServerConfig {
            host: "localhost".to_string(),
            port: 8000,
        };
        assert!(build_socket_addr(&server).is_err());
    }
}
