use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::forge::{BlobSource, CheckReporter};
use crate::job::DiffJob;
use crate::router::{build_router, AppState};

/// The dmmdiff webhook service.
pub struct DmmDiffServer {
    state: AppState,
}

impl DmmDiffServer {
    pub fn new(
        config: ServerConfig,
        source: Arc<dyn BlobSource>,
        reporter: Arc<dyn CheckReporter>,
    ) -> Self {
        let job = DiffJob::new(Arc::new(config), source, reporter);
        Self {
            state: AppState::new(job),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Create the save directory and start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        self.config().prepare_save_dir()?;
        let addr = self.config().bind_addr;
        let app = self.router();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("dmmdiff listening on {addr}");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
