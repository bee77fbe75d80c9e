//! HTTP server for the Prometheus scrape endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::store::SharedStore;

/// Content type of the text exposition format Prometheus scrapes.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Scrape-serving HTTP server.
///
/// Runs on its own accept loop and only reads current gauge values; it
/// never blocks report processing.
pub struct HttpServer {
    store: SharedStore,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    pub fn new(store: SharedStore, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            store,
            listen_addr,
            metrics_path,
        }
    }

    /// Routes served by this exporter.
    ///
    /// Besides the metrics endpoint there is a liveness check and a
    /// readiness check that stays unavailable until the first sample has
    /// been published.
    fn router(&self) -> Router {
        Router::new()
            .route(&self.metrics_path, get(serve_metrics))
            .route("/health", get(|| async { "healthy\n" }))
            .route("/ready", get(serve_ready))
            .layer(CorsLayer::permissive())
            .with_state(self.store.clone())
    }

    /// Serve until the shutdown signal is received, then drain open
    /// connections.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "Metrics endpoint listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // A dropped sender counts as a shutdown request.
                let _ = shutdown.wait_for(|stopped| *stopped).await;
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_metrics(State(store): State<SharedStore>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        store.render(),
    )
}

async fn serve_ready(State(store): State<SharedStore>) -> Response {
    if store.stats().ready() {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no reports published yet\n",
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Metric;
    use crate::handler::MetricPublisher;
    use crate::store::MetricStore;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn server(metrics_path: &str) -> (SharedStore, HttpServer) {
        let store: SharedStore = Arc::new(MetricStore::new());
        let server = HttpServer::new(
            store.clone(),
            "127.0.0.1:0".parse().unwrap(),
            metrics_path.to_string(),
        );
        (store, server)
    }

    async fn get_path(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_body_is_the_rendered_exposition() {
        let (store, server) = server("/metrics");
        store.set(Metric::TempCelsius, "greenhouse", 21.5);
        store.set(Metric::BatteryPcnt, "greenhouse", 100.0);

        let response = server
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            EXPOSITION_CONTENT_TYPE
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("# TYPE temp_celsius gauge"));
        assert!(body.contains("temp_celsius{location=\"greenhouse\"} 21.5"));
        assert!(body.contains("battery_pcnt{location=\"greenhouse\"} 100"));
        assert!(body.contains("zigbee_exporter_samples_total 2"));
    }

    #[tokio::test]
    async fn test_readiness_follows_published_samples() {
        let (store, server) = server("/metrics");

        let (status, body) = get_path(server.router(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("not ready"));

        store.set(Metric::HumidityPcnt, "cellar", 60.0);

        let (status, body) = get_path(server.router(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ready\n");
    }

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let (_store, server) = server("/metrics");

        let (status, body) = get_path(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "healthy\n");
    }

    #[tokio::test]
    async fn test_metrics_served_only_on_configured_path() {
        let (store, server) = server("/zigbee/metrics");
        store.set(Metric::SoilMoisturePct, "greenhouse", 12.0);

        let (status, body) = get_path(server.router(), "/zigbee/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("soil_moisture_pct{location=\"greenhouse\"} 12"));

        let (status, _) = get_path(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
