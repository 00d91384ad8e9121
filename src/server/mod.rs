//! HTTP reader surface
//!
//! Readers only ever touch the [`SelectionCache`]; they never wait on a
//! refresh cycle. Before the first selection is published every selection
//! endpoint answers `503 Service Unavailable`.
//!
//! # Routes
//!
//! | Route            | Response                                  |
//! |------------------|-------------------------------------------|
//! | `/`              | HTML page for the current selection       |
//! | `/api/selection` | Current selection as JSON                 |
//! | `/api/status`    | Cache and scheduler status                |
//! | `/health`        | `{"status":"ok","ready":bool}`            |
//! | `/metrics`       | Prometheus text format                    |

pub mod api;
pub mod page;

pub use api::create_router;
pub use page::{IndexPageData, PageRenderer};

use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::fetcher::SeriesSource;
use crate::scheduler::{RefreshScheduler, RefreshStatus};
use crate::selector::SelectionCache;

// ============================================================================
// App State
// ============================================================================

/// Anything that can report refresh status to the API
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn refresh_status(&self) -> RefreshStatus;
}

#[async_trait]
impl<S: SeriesSource> StatusProvider for RefreshScheduler<S> {
    async fn refresh_status(&self) -> RefreshStatus {
        self.status().await
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Published selection
    pub cache: Arc<SelectionCache>,

    /// Page templates
    pub pages: Arc<PageRenderer>,

    /// Refresh scheduler, when one is running
    pub status: Option<Arc<dyn StatusProvider>>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: Arc<SelectionCache>) -> Result<Self, ServerError> {
        let pages = PageRenderer::new().map_err(|e| ServerError::TemplateError(e.to_string()))?;

        Ok(Self {
            cache,
            pages: Arc::new(pages),
            status: None,
            start_time: Instant::now(),
        })
    }

    pub fn with_status(mut self, provider: Arc<dyn StatusProvider>) -> Self {
        self.status = Some(provider);
        self
    }
}

// ============================================================================
// Server
// ============================================================================

pub struct HindsightServer {
    state: AppState,
    enable_cors: bool,
}

impl HindsightServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            enable_cors: false,
        }
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown_signal` completes
    pub async fn serve(
        &self,
        addr: &str,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{addr}: {e}")))?;

        tracing::info!(addr = %addr, "HTTP server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("HTTP server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Page templates failed to compile
    TemplateError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateError(msg) => write!(f, "Template error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state() {
        let state = AppState::new(Arc::new(SelectionCache::new())).unwrap();
        assert!(state.status.is_none());
        assert!(!state.cache.is_ready().await);
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::BindError("0.0.0.0:80: permission denied".into());
        assert_eq!(err.to_string(), "Failed to bind: 0.0.0.0:80: permission denied");
    }
}
