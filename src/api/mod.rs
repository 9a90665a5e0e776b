//! HTTP control surface for the avatar

pub mod control;
pub mod health;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::ApiServerConfig;
use crate::state::StateHandle;

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub state: StateHandle,
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(control::router(state))
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The control surface server
pub struct ApiServer {
    state: Arc<ApiState>,
    bind: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: StateHandle, config: &ApiServerConfig) -> Self {
        Self {
            state: Arc::new(ApiState { state }),
            bind: config.bind.clone(),
            port: config.port,
        }
    }

    /// Run the API server until `shutdown` changes
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = format!("{}:{}", self.bind, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
