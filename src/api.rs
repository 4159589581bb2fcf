//! HTTP surface for the external scheduler/trigger. Authentication of the
//! trigger is the caller's problem; these routes just run the orchestrators
//! and return their outcomes as JSON.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::config::AppConfig;
use crate::discover::{self, providers::DiscoveryProvider};
use crate::ingest::{self, fetch::FeedFetch};
use crate::model::{DiscoverOutcome, IngestOutcome, Item};
use crate::policy::PolicyTable;
use crate::store::ContentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub fetcher: Arc<dyn FeedFetch>,
    pub providers: Arc<Vec<Box<dyn DiscoveryProvider>>>,
    pub policies: Arc<PolicyTable>,
    pub cfg: Arc<AppConfig>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ingest", post(ingest_once))
        .route("/discover", post(discover_once))
        .route("/debug/items", get(debug_items))
        .with_state(state)
}

async fn ingest_once(State(state): State<AppState>) -> Json<IngestOutcome> {
    let out = ingest::run_once(
        state.store.as_ref(),
        state.fetcher.as_ref(),
        &state.policies,
        &state.cfg,
    )
    .await;
    Json(out)
}

async fn discover_once(State(state): State<AppState>) -> Json<DiscoverOutcome> {
    let out = discover::run_once(
        state.store.as_ref(),
        &state.providers,
        &state.policies,
        &state.cfg,
    )
    .await;
    Json(out)
}

async fn debug_items(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Item>> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(50)
        .min(500);
    let items = state.store.recent_items(limit).await.unwrap_or_default();
    Json(items)
}
