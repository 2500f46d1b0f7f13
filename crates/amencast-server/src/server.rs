//! `HealthServer`: the worker's HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use amencast_pipeline::Stage;
use amencast_settings::ServerSettings;

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stages running in this process.
    pub stages: Arc<Vec<Arc<dyn Stage>>>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the worker started.
    pub start_time: Instant,
}

/// Serves `/health` for the stages of one worker process.
pub struct HealthServer {
    settings: ServerSettings,
    state: AppState,
}

impl HealthServer {
    /// Create a server reporting on `stages`.
    pub fn new(
        settings: ServerSettings,
        stages: Vec<Arc<dyn Stage>>,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            settings,
            state: AppState {
                stages: Arc::new(stages),
                shutdown,
                start_time: Instant::now(),
            },
        }
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = format!("{}:{}", self.settings.host, self.settings.health_port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(?addr, "health server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        info!("health server stopped");
        Ok(())
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let shutting_down = state.shutdown.is_shutting_down();
    let resp = health::health_check(state.start_time, &state.stages, shutting_down);
    let code = if shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(resp))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use amencast_pipeline::PipelineError;

    use super::*;

    struct Idle;

    #[async_trait]
    impl Stage for Idle {
        fn name(&self) -> &'static str {
            "translation"
        }

        fn active_streams(&self) -> usize {
            4
        }

        async fn run(&self, _shutdown: CancellationToken) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn make_server() -> HealthServer {
        let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(Idle)];
        HealthServer::new(
            ServerSettings::default(),
            stages,
            Arc::new(ShutdownCoordinator::new()),
        )
    }

    async fn get_health(app: Router) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (status, body) = get_health(make_server().router()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["activeStreams"], 4);
        assert_eq!(body["stages"][0]["name"], "translation");
    }

    #[tokio::test]
    async fn health_reports_shutdown() {
        let server = make_server();
        server.state.shutdown.shutdown();
        let (status, body) = get_health(server.router()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "shutting_down");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = make_server().router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_cancellation() {
        let settings = ServerSettings {
            host: "127.0.0.1".into(),
            health_port: 0,
            ..ServerSettings::default()
        };
        let server = HealthServer::new(settings, Vec::new(), Arc::new(ShutdownCoordinator::new()));
        let listener = server.bind().await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        server.serve(listener, token).await.unwrap();
    }
}
