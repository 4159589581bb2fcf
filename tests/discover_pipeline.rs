// tests/discover_pipeline.rs
// Discovery orchestration with stub providers: provider diversity, per-run
// caps, interval gating, and dedup against the pool and the store.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use newsdesk::config::AppConfig;
use newsdesk::discover::{
    self,
    providers::{DiscoveryCandidate, DiscoveryProvider, Provider},
};
use newsdesk::model::{NewItem, NewSource, Section, SourceKind};
use newsdesk::policy::{DiscoveryPolicy, PolicyTable};
use newsdesk::store::{ContentStore, MemoryStore};

struct StubProvider {
    provider: Provider,
    candidates: Vec<DiscoveryCandidate>,
}

impl StubProvider {
    fn new(provider: Provider, urls: &[(&str, &str)]) -> Self {
        let now = Utc::now();
        let candidates = urls
            .iter()
            .enumerate()
            .map(|(i, (title, url))| DiscoveryCandidate {
                provider,
                title: title.to_string(),
                url: url.to_string(),
                snippet: "A candidate snippet of workable length for scoring.".into(),
                published_at: now - Duration::hours(i as i64 + 1),
                raw_categories: vec![],
            })
            .collect();
        Self {
            provider,
            candidates,
        }
    }
}

#[async_trait]
impl DiscoveryProvider for StubProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn gather(
        &self,
        _section: Section,
        _policy: &DiscoveryPolicy,
    ) -> anyhow::Result<Vec<DiscoveryCandidate>> {
        Ok(self.candidates.clone())
    }
}

/// Policy table where only `tech` runs discovery, so assertions stay local.
fn tech_only_policies() -> PolicyTable {
    PolicyTable::from_toml_str(
        r#"
        [sections.science]
        daily_cap = 4
        [sections.culture]
        daily_cap = 4
        [sections.tech]
        daily_cap = 6
        [sections.tech.discovery]
        video_query = "technology deep dive"
        social_tag = "tech"
        "#,
    )
    .unwrap()
}

fn providers() -> Vec<Box<dyn DiscoveryProvider>> {
    vec![
        Box::new(StubProvider::new(
            Provider::Releases,
            &[
                ("acme/widget v2.0.0", "https://github.com/acme/widget/releases/tag/v2.0.0"),
                ("acme/widget v1.9.9", "https://github.com/acme/widget/releases/tag/v1.9.9"),
                ("acme/gadget v0.4.0", "https://github.com/acme/gadget/releases/tag/v0.4.0"),
            ],
        )),
        Box::new(StubProvider::new(
            Provider::Video,
            &[
                ("Deep dive: allocators", "https://www.youtube.com/watch?v=aaa111"),
                ("Deep dive: schedulers", "https://www.youtube.com/watch?v=bbb222"),
            ],
        )),
        Box::new(StubProvider::new(
            Provider::Social,
            &[("Shipping a new parser today", "https://social.example/@a/1")],
        )),
    ]
}

#[tokio::test]
async fn one_winner_per_provider_capped_per_run() {
    let store = MemoryStore::new();
    let policies = tech_only_policies();
    let cfg = AppConfig::default();

    let out = discover::run_once(&store, &providers(), &policies, &cfg).await;
    assert!(out.ok);
    assert_eq!(out.stats.sections_due, 1);
    assert_eq!(out.added, 3, "at most one per provider, three providers");

    let items = store.recent_items(10).await.unwrap();
    assert_eq!(items.len(), 3);
    let release_rows = items
        .iter()
        .filter(|i| i.url.contains("github.com"))
        .count();
    let video_rows = items.iter().filter(|i| i.url.contains("youtube.com")).count();
    let social_rows = items
        .iter()
        .filter(|i| i.url.contains("social.example"))
        .count();
    assert_eq!((release_rows, video_rows, social_rows), (1, 1, 1));
    // all owned by the synthetic discovery source
    let synthetic = store.source_by_url("discovery://tech").await.unwrap().unwrap();
    assert!(items.iter().all(|i| i.source_id == synthetic.id));
    assert_eq!(synthetic.kind, SourceKind::Discovery);
}

#[tokio::test]
async fn interval_gate_blocks_immediate_second_run() {
    let store = MemoryStore::new();
    let policies = tech_only_policies();
    let cfg = AppConfig::default();

    let first = discover::run_once(&store, &providers(), &policies, &cfg).await;
    assert_eq!(first.stats.sections_due, 1);

    let second = discover::run_once(&store, &providers(), &policies, &cfg).await;
    assert!(second.ok);
    assert_eq!(second.stats.sections_due, 0);
    assert_eq!(second.added, 0);
}

#[tokio::test]
async fn candidates_already_in_storage_are_dropped() {
    let store = MemoryStore::new();
    let policies = tech_only_policies();
    let cfg = AppConfig::default();
    let now = Utc::now();

    // the best release candidate is already stored from an earlier path
    let src = store
        .upsert_source(NewSource {
            url: "https://seed.example/rss".into(),
            section: Section::Tech,
            name: "seed".into(),
            kind: SourceKind::Rss,
            country: None,
            trust_score: 70,
        })
        .await
        .unwrap();
    store
        .upsert_item(NewItem {
            url: "https://github.com/acme/widget/releases/tag/v2.0.0".into(),
            source_id: src.id,
            section: Section::Tech,
            title: "already here".into(),
            summary: "s".into(),
            country: None,
            topics: vec![],
            score: 0.4,
            published_at: now - Duration::days(2),
            created_at: now - Duration::days(2),
        })
        .await
        .unwrap();

    let out = discover::run_once(&store, &providers(), &policies, &cfg).await;
    assert!(out.ok);
    assert!(out.stats.deduped >= 1);
    // releases still win with their runner-up candidate
    let items = store.recent_items(20).await.unwrap();
    assert!(items
        .iter()
        .any(|i| i.url == "https://github.com/acme/widget/releases/tag/v1.9.9"));
}

#[tokio::test]
async fn duplicate_titles_across_providers_collapse() {
    let store = MemoryStore::new();
    let policies = tech_only_policies();
    let cfg = AppConfig::default();

    let set: Vec<Box<dyn DiscoveryProvider>> = vec![
        Box::new(StubProvider::new(
            Provider::Video,
            &[("Rust 1.80: what's new!", "https://www.youtube.com/watch?v=ccc333")],
        )),
        Box::new(StubProvider::new(
            Provider::Social,
            &[("Rust 1.80 — what's new", "https://social.example/@b/9")],
        )),
    ];
    let out = discover::run_once(&store, &set, &policies, &cfg).await;
    assert_eq!(out.stats.deduped, 1);
    assert_eq!(out.added, 1);
}

#[tokio::test]
async fn exhausted_day_quota_blocks_discovery() {
    let store = MemoryStore::new();
    let policies = tech_only_policies();
    let cfg = AppConfig::default();
    let now = Utc::now();

    let src = store
        .upsert_source(NewSource {
            url: "https://seed.example/rss".into(),
            section: Section::Tech,
            name: "seed".into(),
            kind: SourceKind::Rss,
            country: None,
            trust_score: 70,
        })
        .await
        .unwrap();
    // fill the tech day window up to its organic cap (6)
    for i in 0..6 {
        store
            .upsert_item(NewItem {
                url: format!("https://seed.example/{i}"),
                source_id: src.id,
                section: Section::Tech,
                title: "t".into(),
                summary: "s".into(),
                country: None,
                topics: vec![],
                score: 0.6,
                published_at: now - Duration::hours(2),
                created_at: now - Duration::hours(2),
            })
            .await
            .unwrap();
    }

    let out = discover::run_once(&store, &providers(), &policies, &cfg).await;
    assert!(out.ok);
    assert_eq!(out.added, 0, "no remaining day quota, nothing admitted");
}

#[tokio::test]
async fn discovery_rows_refresh_collection_time() {
    let store = MemoryStore::new();
    let policies = tech_only_policies();
    let cfg = AppConfig::default();
    let before = Utc::now() - Duration::seconds(5);

    discover::run_once(&store, &providers(), &policies, &cfg).await;
    let items = store.recent_items(10).await.unwrap();
    assert!(!items.is_empty());
    // published_at can be hours old; created_at is stamped at admission
    assert!(items.iter().all(|i| i.created_at > before));
    assert!(items.iter().all(|i| i.published_at < i.created_at));
}
