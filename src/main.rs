//! Binary entrypoint: boots the Axum HTTP surface, wiring the store, feed
//! fetcher, discovery providers, and metrics exporter behind the two
//! orchestrator trigger routes.

use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsdesk::api::{create_router, AppState};
use newsdesk::config::AppConfig;
use newsdesk::discover::providers;
use newsdesk::ingest::fetch::HttpFeedFetcher;
use newsdesk::labels::normalize_section_label;
use newsdesk::metrics::Metrics;
use newsdesk::model::{NewSource, SourceKind};
use newsdesk::policy::PolicyTable;
use newsdesk::store::{ContentStore, MemoryStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newsdesk=info,ingest=info,discover=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    sources: Vec<SeedSource>,
}

#[derive(Debug, Deserialize)]
struct SeedSource {
    url: String,
    section: String,
    name: String,
    #[serde(default = "default_trust")]
    trust: u8,
    #[serde(default)]
    country: Option<String>,
}

fn default_trust() -> u8 {
    60
}

/// Register the bootstrap source list, if one is present. Catalog sync
/// proper lives outside this service; this only makes a fresh in-memory
/// store useful.
async fn seed_sources(store: &dyn ContentStore, path: &str) {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            tracing::info!(path, "no source seed file, starting with an empty registry");
            return;
        }
    };
    let seed: SeedFile = match toml::from_str(&content) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path, error = %e, "source seed file rejected");
            return;
        }
    };
    let mut registered = 0usize;
    for src in seed.sources {
        let Some(section) = normalize_section_label(&src.section) else {
            tracing::warn!(url = %src.url, label = %src.section, "unknown section in seed file");
            continue;
        };
        let res = store
            .upsert_source(NewSource {
                url: src.url,
                section,
                name: src.name,
                kind: SourceKind::Rss,
                country: src.country,
                trust_score: src.trust.min(100),
            })
            .await;
        match res {
            Ok(_) => registered += 1,
            Err(e) => tracing::warn!(error = %e, "seed source upsert failed"),
        }
    }
    tracing::info!(registered, "source registry seeded");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let policies = PolicyTable::load_from_file(&cfg.policy_path);

    let store = Arc::new(MemoryStore::new());
    seed_sources(store.as_ref(), &cfg.sources_path).await;

    let fetcher = Arc::new(HttpFeedFetcher::new(cfg.request_timeout_ms)?);
    let provider_set = Arc::new(providers::default_set(&cfg)?);

    let metrics = Metrics::init(cfg.time_budget_ms);
    let port = cfg.port;

    let state = AppState {
        store,
        fetcher,
        providers: provider_set,
        policies: Arc::new(policies),
        cfg: Arc::new(cfg),
    };
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "newsdesk listening");
    axum::serve(listener, app).await?;
    Ok(())
}
