// tests/api_http.rs
// Router smoke tests: the trigger endpoints respond with outcome JSON even
// over an empty registry.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request};
use tower::ServiceExt;

use newsdesk::api::{create_router, AppState};
use newsdesk::config::AppConfig;
use newsdesk::discover::providers::DiscoveryProvider;
use newsdesk::ingest::fetch::{FeedFetch, FetchError, FetchedFeed};
use newsdesk::policy::PolicyTable;
use newsdesk::store::MemoryStore;

struct DeadFetcher;

#[async_trait]
impl FeedFetch for DeadFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedFeed, FetchError> {
        Err(FetchError::Status(503))
    }
}

fn app() -> axum::Router {
    let providers: Vec<Box<dyn DiscoveryProvider>> = Vec::new();
    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        fetcher: Arc::new(DeadFetcher),
        providers: Arc::new(providers),
        policies: Arc::new(PolicyTable::default_seed()),
        cfg: Arc::new(AppConfig::default()),
    };
    create_router(state)
}

#[tokio::test]
async fn health_answers() {
    let resp = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn ingest_trigger_returns_outcome_json() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["ok"], true);
    assert_eq!(v["added"], 0);
    assert!(v["stats"]["stopped_early"].is_boolean());
}

#[tokio::test]
async fn discover_trigger_returns_outcome_json() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/discover")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["ok"], true);
}

#[tokio::test]
async fn debug_items_lists_nothing_on_a_fresh_store() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/debug/items?limit=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v.as_array().map(|a| a.len()), Some(0));
}
