//! HTTP API server for the voice relay

pub mod health;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::pipeline::Pipeline;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Pipeline,
    /// Largest accepted audio upload, in bytes
    pub max_upload_bytes: usize,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    pipeline: Pipeline,
    port: u16,
    max_upload_bytes: usize,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(pipeline: Pipeline, port: u16) -> Self {
        Self {
            pipeline,
            port,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set the upload size limit
    #[must_use]
    pub const fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            pipeline: self.pipeline,
            max_upload_bytes: self.max_upload_bytes,
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/voice", voice::router(self.state.clone()))
            .merge(health::router());

        // CORS layer for cross-origin requests from browser clients
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await.inspect_err(|e| {
            tracing::error!(addr = %addr, error = %e, "failed to bind API server");
        })?;

        tracing::info!(
            port = self.port,
            max_upload_bytes = self.state.max_upload_bytes,
            "API server listening"
        );

        axum::serve(listener, self.router()).await?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
