//! HTTP server for the Prometheus metrics endpoint.

use crate::metrics::MetricsRegistry;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use healthcheck::{CancellationToken, Scheduler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    metrics: Arc<MetricsRegistry>,
    scheduler: Arc<Scheduler>,
}

/// Serves `/metrics`, `/health` and `/status`
pub struct MetricsServer {
    state: AppState,
    listen_addr: String,
}

impl MetricsServer {
    pub fn new(metrics: Arc<MetricsRegistry>, scheduler: Arc<Scheduler>, listen_addr: String) -> Self {
        Self {
            state: AppState { metrics, scheduler },
            listen_addr,
        }
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }

    /// Bind and serve until `stop` is cancelled
    pub async fn run(self, stop: CancellationToken) -> common::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "Metrics server listening");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await?;

        info!("Metrics server stopped");
        Ok(())
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {e}"),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn status_handler(State(state): State<AppState>) -> Response {
    Json(state.scheduler.statuses().await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use healthcheck::{EndpointConfig, HttpProber};
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        let scheduler = Scheduler::new(Arc::new(HttpProber::new().unwrap()));
        scheduler
            .add_config(&EndpointConfig::new("http://localhost/", Duration::from_secs(1)).with_id("api"))
            .unwrap();
        AppState {
            metrics: Arc::new(MetricsRegistry::new()),
            scheduler: Arc::new(scheduler),
        }
    }

    async fn get_body(uri: &str) -> (StatusCode, String) {
        let response = MetricsServer::router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let (status, body) = get_body("/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthcheck_endpoints"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (status, body) = get_body("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_status_handler() {
        let (status, body) = get_body("/status").await;
        assert_eq!(status, StatusCode::OK);

        let statuses: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(statuses[0]["endpoint_id"], "api");
        assert_eq!(statuses[0]["state"]["current"], "unknown");
        assert!(statuses[0]["availability"].is_null());
    }

    #[tokio::test]
    async fn test_server_stops_on_cancel() {
        let stop = CancellationToken::new();
        let server = MetricsServer::new(
            Arc::new(MetricsRegistry::new()),
            state().scheduler,
            "127.0.0.1:0".to_string(),
        );
        let handle = tokio::spawn(server.run(stop.clone()));

        stop.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
