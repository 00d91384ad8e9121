//! HTTP routes and handlers for the reader surface

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Instant;

use super::AppState;
use crate::models::Selection;
use crate::scheduler::RefreshStatus;
use crate::selector::CacheStatus;

// ============================================================================
// API Response Types
// ============================================================================

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
}

/// Published selection as JSON
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub id: String,
    pub source: String,
    pub key: String,
    pub description: String,
    pub old_value: f64,
    pub new_value: f64,
    pub old_time: DateTime<Utc>,
    pub new_time: DateTime<Utc>,
    pub score: Option<f64>,
    pub percent_change: Option<f64>,
    pub selected_at: DateTime<Utc>,
}

impl From<&Selection> for SelectionResponse {
    fn from(selection: &Selection) -> Self {
        let outcome = &selection.outcome;
        Self {
            id: selection.candidate.id(),
            source: selection.candidate.source.clone(),
            key: selection.candidate.key.clone(),
            description: selection.candidate.description.clone(),
            old_value: outcome.old_value,
            new_value: outcome.new_value,
            old_time: outcome.old_time,
            new_time: outcome.new_time,
            score: outcome.score(),
            percent_change: outcome.percent_change(),
            selected_at: selection.selected_at,
        }
    }
}

/// Service status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub cache: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<RefreshStatus>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/selection", get(get_selection))
        .route("/api/status", get(get_status))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn index_page(State(state): State<AppState>) -> Response {
    let rendered = match state.cache.current().await {
        Some(selection) => state
            .pages
            .render_selection(&selection)
            .map(|html| (StatusCode::OK, html)),
        None => state
            .pages
            .render_unavailable()
            .map(|html| (StatusCode::SERVICE_UNAVAILABLE, html)),
    };

    match rendered {
        Ok((status, html)) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

async fn get_selection(State(state): State<AppState>) -> Response {
    match state.cache.current().await {
        Some(selection) => Json(SelectionResponse::from(&selection)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Selection not yet available")),
        )
            .into_response(),
    }
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = match &state.status {
        Some(provider) => Some(provider.refresh_status().await),
        None => None,
    };

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: state.cache.status().await,
        scheduler,
    })
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        ready: state.cache.is_ready().await,
    })
}

async fn metrics() -> Response {
    match crate::metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Log each request with the client address and record HTTP metrics
async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_addr(req.headers(), peer);
    let method = req.method().clone();
    let uri = req.uri().clone();

    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed = started.elapsed().as_secs_f64();

    tracing::info!(
        method = %method,
        client = %client,
        uri = %uri,
        status = response.status().as_u16(),
        "Request"
    );
    crate::metrics::record_http_request(&route, response.status().as_u16(), elapsed);

    response
}

/// Client address, preferring the first `X-Forwarded-For` entry
pub fn client_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| String::from("-"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::new("test error");
        assert!(!response.success);
        assert_eq!(response.error, "test error");
    }

    #[test]
    fn test_client_addr_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        assert_eq!(client_addr(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_client_addr_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        assert_eq!(client_addr(&HeaderMap::new(), Some(peer)), "192.0.2.10");
        assert_eq!(client_addr(&HeaderMap::new(), None), "-");
    }
}
