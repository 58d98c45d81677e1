use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler;
use crate::job::DiffJob;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub job: Arc<DiffJob>,
}

impl AppState {
    pub fn new(job: DiffJob) -> Self {
        let config = Arc::new(job.config().clone());
        Self {
            config,
            job: Arc::new(job),
        }
    }
}

/// Build the axum router with all dmmdiff endpoints.
pub fn build_router(state: AppState) -> Router {
    let dmm_route = format!("{}/:filename", state.config.dmm_url);
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route(&state.config.webhook_path, post(handler::webhook_handler))
        .route(&dmm_route, get(handler::dmm_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
