// tests/ingest_pipeline.rs
// End-to-end organic ingestion against the in-memory store, with a canned
// feed fetcher standing in for the network.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use newsdesk::config::AppConfig;
use newsdesk::ingest::{
    self,
    fetch::{FeedFetch, FetchError, FetchedFeed},
};
use newsdesk::model::{NewSource, Section, SourceKind};
use newsdesk::policy::PolicyTable;
use newsdesk::store::{ContentStore, MemoryStore};

struct CannedFetcher {
    bodies: HashMap<String, String>,
}

impl CannedFetcher {
    fn new() -> Self {
        Self {
            bodies: HashMap::new(),
        }
    }

    fn serve(mut self, url: &str, body: String) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }
}

#[async_trait]
impl FeedFetch for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        match self.bodies.get(url) {
            Some(body) => Ok(FetchedFeed {
                bytes: body.as_bytes().to_vec(),
                content_type: "application/rss+xml".into(),
            }),
            None => Err(FetchError::Status(500)),
        }
    }
}

fn rss(items: &[(&str, &str, chrono::DateTime<Utc>)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>A reasonably substantial description of the piece.</description>\
                 <pubDate>{}</pubDate></item>",
                date.to_rfc2822()
            )
        })
        .collect();
    format!("<rss version=\"2.0\"><channel>{body}</channel></rss>")
}

async fn add_source(store: &MemoryStore, url: &str, section: Section, trust: u8) {
    store
        .upsert_source(NewSource {
            url: url.into(),
            section,
            name: url.into(),
            kind: SourceKind::Rss,
            country: None,
            trust_score: trust,
        })
        .await
        .unwrap();
}

fn quiet_cfg() -> AppConfig {
    AppConfig::default()
}

#[tokio::test]
async fn one_admission_per_section_and_best_candidate_wins() {
    let store = MemoryStore::new();
    let now = Utc::now();
    add_source(&store, "https://a.example/rss", Section::Global, 95).await;
    add_source(&store, "https://b.example/rss", Section::Global, 75).await;
    add_source(&store, "https://c.example/rss", Section::Global, 55).await;

    let fetcher = CannedFetcher::new()
        .serve(
            "https://a.example/rss",
            rss(&[("Fresh and trusted", "https://a.example/1", now)]),
        )
        .serve(
            "https://b.example/rss",
            rss(&[("Middling", "https://b.example/1", now - Duration::hours(1))]),
        )
        .serve(
            "https://c.example/rss",
            rss(&[("Stale and shaky", "https://c.example/1", now - Duration::hours(2))]),
        );

    let policies = PolicyTable::default_seed();
    let out = ingest::run_once(&store, &fetcher, &policies, &quiet_cfg()).await;

    assert!(out.ok);
    assert_eq!(out.added, 1, "one admission per section per run");
    let items = store.recent_items(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, "https://a.example/1");
    assert_eq!(items[0].section, Section::Global);
    assert!(items[0].score > 0.0 && items[0].score <= 1.0);
}

#[tokio::test]
async fn immediate_rerun_admits_nothing() {
    let store = MemoryStore::new();
    let now = Utc::now();
    add_source(&store, "https://a.example/rss", Section::Tech, 80).await;
    let fetcher = CannedFetcher::new().serve(
        "https://a.example/rss",
        rss(&[("Unchanged candidate", "https://a.example/1", now)]),
    );
    let policies = PolicyTable::default_seed();
    let cfg = quiet_cfg();

    let first = ingest::run_once(&store, &fetcher, &policies, &cfg).await;
    assert_eq!(first.added, 1);

    // Same pool, caps unchanged: the no-repeat guard blocks the URL.
    let second = ingest::run_once(&store, &fetcher, &policies, &cfg).await;
    assert!(second.ok);
    assert_eq!(second.added, 0);
    assert_eq!(store.recent_items(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failing_source_is_counted_but_run_continues() {
    let store = MemoryStore::new();
    let now = Utc::now();
    add_source(&store, "https://ok.example/rss", Section::Global, 80).await;
    add_source(&store, "https://down.example/rss", Section::Global, 80).await;
    let fetcher = CannedFetcher::new().serve(
        "https://ok.example/rss",
        rss(&[("Still here", "https://ok.example/1", now)]),
    );
    let policies = PolicyTable::default_seed();

    let out = ingest::run_once(&store, &fetcher, &policies, &quiet_cfg()).await;
    assert!(out.ok);
    assert_eq!(out.added, 1);
    assert_eq!(out.stats.fetch_failed, 1);

    let down = store
        .source_by_url("https://down.example/rss")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(down.consecutive_fails, 1);
    assert!(down.enabled, "one failure never disables");
}

#[tokio::test]
async fn auto_disable_policy_trips_at_threshold() {
    let store = MemoryStore::new();
    add_source(&store, "https://down.example/rss", Section::Global, 80).await;
    let fetcher = CannedFetcher::new();
    let policies = PolicyTable::default_seed();
    let cfg = AppConfig {
        auto_disable: true,
        disable_after_fails: 2,
        ..AppConfig::default()
    };

    ingest::run_once(&store, &fetcher, &policies, &cfg).await;
    let row = store
        .source_by_url("https://down.example/rss")
        .await
        .unwrap()
        .unwrap();
    assert!(row.enabled);

    ingest::run_once(&store, &fetcher, &policies, &cfg).await;
    let row = store
        .source_by_url("https://down.example/rss")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.consecutive_fails, 2);
    assert!(!row.enabled);
}

#[tokio::test]
async fn exhausted_budget_stops_early_and_skips_fallback() {
    let store = MemoryStore::new();
    add_source(&store, "https://a.example/rss", Section::Global, 80).await;
    let fetcher = CannedFetcher::new().serve(
        "https://a.example/rss",
        rss(&[("Never fetched", "https://a.example/1", Utc::now())]),
    );
    let policies = PolicyTable::default_seed();
    let cfg = AppConfig {
        time_budget_ms: 0,
        ..AppConfig::default()
    };

    let out = ingest::run_once(&store, &fetcher, &policies, &cfg).await;
    assert!(out.ok);
    assert!(out.stats.stopped_early);
    assert_eq!(out.added, 0);
    assert_eq!(out.stats.fetched_ok, 0);
    // every section's month window is empty, yet no fallback row appears
    for section in Section::ALL {
        assert!(store
            .source_by_url(&format!("fallback://{section}"))
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn fallback_fills_only_empty_sections() {
    let store = MemoryStore::new();
    let now = Utc::now();
    add_source(&store, "https://a.example/rss", Section::Global, 80).await;
    let policies = PolicyTable::default_seed();

    let science_query = policies
        .get(Section::Science)
        .fallback_query
        .clone()
        .unwrap();
    let fetcher = CannedFetcher::new()
        .serve(
            "https://a.example/rss",
            rss(&[("Organic global story", "https://a.example/1", now)]),
        )
        .serve(
            &ingest::fallback::primary_url(&science_query),
            rss(&[("Backfilled science story", "https://agg.example/sci", now)]),
        );

    let out = ingest::run_once(&store, &fetcher, &policies, &quiet_cfg()).await;
    assert!(out.ok);
    assert!(out.stats.fallback_sections >= 1);

    let items = store.recent_items(50).await.unwrap();
    let science: Vec<_> = items.iter().filter(|i| i.section == Section::Science).collect();
    assert_eq!(science.len(), 1);
    assert_eq!(science[0].url, "https://agg.example/sci");
    assert!((science[0].score - 0.5).abs() < 1e-6, "fallback items carry the fixed score");

    // global had an organic admission, so no fallback row was registered
    assert!(store
        .source_by_url("fallback://global")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .source_by_url("fallback://science")
        .await
        .unwrap()
        .is_some());
}
