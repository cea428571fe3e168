//! HTTP server for Prometheus metrics endpoint.

use crate::metrics::MetricsRegistry;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(8080)
    }
}

impl MetricsServerConfig {
    /// Creates a config listening on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// HTTP server for exposing Prometheus metrics.
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: MetricsRegistry,
}

impl MetricsServer {
    /// Creates a new metrics server.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self { config, registry }
    }

    /// Builds the router serving `/metrics` and `/health`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.registry.clone())
    }

    /// Starts the HTTP server.
    ///
    /// Runs until `shutdown` resolves, then drains in-flight scrapes.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            "Metrics server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

/// Handler for the /metrics endpoint.
///
/// Gathering performs a blocking backend query, so it runs on the blocking
/// thread pool.
async fn metrics_handler(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    let encoded = tokio::task::spawn_blocking(move || registry.encode()).await;

    match encoded {
        Ok(Ok(output)) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
        Err(e) => {
            tracing::error!(error = %e, "metrics gathering task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        CardinalitySource, ClientError, LabelNamesResponse, LabelValueCardinality,
        LabelValuesLabel, LabelValuesResponse,
    };
    use crate::metrics::CardinalityQuery;
    use std::time::Duration;

    struct OneJob;

    impl CardinalitySource for OneJob {
        fn label_values_cardinality(
            &self,
            _label_names: &[String],
            _selector: &str,
            _timeout: Duration,
        ) -> Result<LabelValuesResponse, ClientError> {
            Ok(LabelValuesResponse {
                series_count_total: 5,
                labels: vec![LabelValuesLabel {
                    label_name: "job".to_string(),
                    label_values_count: 1,
                    series_count: 5,
                    cardinality: vec![LabelValueCardinality {
                        label_value: "api".to_string(),
                        series_count: 5,
                    }],
                }],
            })
        }

        fn label_names_cardinality(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<LabelNamesResponse, ClientError> {
            Err(ClientError::Config("unused".to_string()))
        }
    }

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(9090);
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[tokio::test]
    async fn test_metrics_handler_renders_collector() {
        let registry = MetricsRegistry::new(
            OneJob,
            CardinalityQuery::new("job", Duration::from_secs(1)),
        )
        .unwrap();

        let response = metrics_handler(State(registry)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("grafana_mimir_top_cardinality{dimension=\"job\",exported_job=\"api\"} 5"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_server_serves_until_shutdown() {
        let registry = MetricsRegistry::new(
            OneJob,
            CardinalityQuery::new("job", Duration::from_secs(1)),
        )
        .unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = MetricsServer::new(MetricsServerConfig { bind_addr: addr }, registry);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
