use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use groupflow_core::config::GatewayConfig;
use groupflow_runner::{PlanStore, TaskRunner};

use crate::routes;
use crate::state::AppState;

/// HTTP surface for front-end collaborators, built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    runner: Arc<TaskRunner>,
    plans: Arc<PlanStore>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, runner: Arc<TaskRunner>, plans: Arc<PlanStore>) -> Self {
        Self {
            config,
            runner,
            plans,
        }
    }

    /// Run the gateway until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            runner: self.runner.clone(),
            plans: self.plans.clone(),
        });

        let app = Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/plans", get(routes::list_plans))
            .route("/api/plans", post(routes::save_plan))
            .route("/api/plans/{name}", get(routes::get_plan))
            .route("/api/plans/{name}", delete(routes::delete_plan))
            .route("/api/run", post(routes::start_run))
            .route("/api/runs/{id}", get(routes::run_status))
            .route("/api/runs/{id}/cancel", post(routes::cancel_run))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
