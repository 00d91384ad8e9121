//! HTTP surface tests
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`;
//! no socket is opened.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use common::{candidates, selection, StubSource};
use hindsight::fetcher::BatchFetcher;
use hindsight::limiter::RateLimiter;
use hindsight::scheduler::{RefreshSchedule, RefreshScheduler};
use hindsight::selector::{Ranker, SelectionCache};
use hindsight::server::{AppState, HindsightServer};
use std::sync::Arc;
use tower::ServiceExt;

fn router(cache: Arc<SelectionCache>) -> Router {
    let state = AppState::new(cache).unwrap();
    HindsightServer::new(state).build_router()
}

async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_unavailable_before_first_selection() {
    let cache = Arc::new(SelectionCache::new());

    let (status, body) = get(router(cache.clone()), "/").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("not yet available"));

    let (status, body) = get(router(cache.clone()), "/api/selection").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], false);

    let (status, body) = get(router(cache), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_serves_published_selection() {
    let cache = Arc::new(SelectionCache::new());
    cache.publish(selection("NVDA", Utc::now())).await;

    let (status, body) = get(router(cache.clone()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Test NVDA"));
    // 10.0 -> 25.0
    assert!(body.contains("150%"));

    let (status, body) = get(router(cache), "/api/selection").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["id"], "TEST/NVDA");
    assert_eq!(json["old_value"], 10.0);
    assert_eq!(json["new_value"], 25.0);
    assert_eq!(json["score"], 2.5);
}

#[tokio::test]
async fn test_status_includes_scheduler() {
    let cache = Arc::new(SelectionCache::new());
    let scheduler = Arc::new(RefreshScheduler::new(
        candidates(&["A", "B"]),
        BatchFetcher::new(
            StubSource::new(&[("A", 10.0, 20.0), ("B", 10.0, 12.0)]),
            RateLimiter::unlimited(),
        ),
        Ranker::new(1),
        cache.clone(),
        RefreshSchedule::default(),
    ));
    scheduler.trigger_refresh().await.unwrap();

    let state = AppState::new(cache).unwrap().with_status(scheduler);
    let router = HindsightServer::new(state).build_router();

    let (status, body) = get(router, "/api/status").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["cache"]["has_selection"], true);
    assert_eq!(json["cache"]["generation"], 1);
    assert_eq!(json["scheduler"]["candidates"], 2);
    assert_eq!(json["scheduler"]["cycles_completed"], 1);
    assert_eq!(json["scheduler"]["state"], "idle");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (status, _) = get(router(Arc::new(SelectionCache::new())), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = get(router(Arc::new(SelectionCache::new())), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
