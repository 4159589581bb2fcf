//! # Discovery Pipeline
//! The independently scheduled, multi-provider path: at most one run per
//! section per interval, provider-diversity admission, its own smaller caps
//! and retention. Shares the scorer, policy table, and pruner with organic
//! ingestion.

pub mod providers;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use futures::future::join_all;
use metrics::{counter, gauge};

use crate::config::AppConfig;
use crate::ingest::prune;
use crate::labels::canonical_topics;
use crate::model::{DiscoverOutcome, DiscoverStats, NewItem, NewSource, RunKind, Section, SourceKind};
use crate::policy::PolicyTable;
use crate::scoring;
use crate::store::{ContentStore, WindowQuery};

use providers::{DiscoveryCandidate, DiscoveryProvider, Provider};

const DISCOVERY_SOURCE_TRUST: u8 = 55;

/// Strip tracking noise so the same link in two providers collides:
/// lowercase scheme+host, drop fragments, tracking params, trailing slash.
pub fn normalize_url(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    if let Some(i) = s.find('#') {
        s.truncate(i);
    }
    if let Some(i) = s.find('?') {
        let (base, query) = s.split_at(i);
        let kept: Vec<&str> = query[1..]
            .split('&')
            .filter(|p| {
                let key = p.split('=').next().unwrap_or_default();
                !key.starts_with("utm_") && !matches!(key, "ref" | "fbclid" | "gclid")
            })
            .collect();
        s = if kept.is_empty() {
            base.to_string()
        } else {
            format!("{base}?{}", kept.join("&"))
        };
    }
    if let Some(pos) = s.find("://") {
        let host_end = s[pos + 3..]
            .find('/')
            .map(|i| pos + 3 + i)
            .unwrap_or(s.len());
        let lowered = s[..host_end].to_lowercase();
        s.replace_range(..host_end, &lowered);
    }
    while s.ends_with('/') {
        s.pop();
    }
    s
}

/// Lowercased, punctuation-stripped title key for cross-provider dedup.
pub fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run one discovery cycle over every section that is due.
pub async fn run_once(
    store: &dyn ContentStore,
    provider_set: &[Box<dyn DiscoveryProvider>],
    policies: &PolicyTable,
    cfg: &AppConfig,
) -> DiscoverOutcome {
    crate::metrics::ensure_described();
    let now = Utc::now();
    let started = std::time::Instant::now();
    let mut stats = DiscoverStats::default();
    let mut added = 0u32;
    let mut skipped = 0u32;

    let run_id = match store.create_run(RunKind::Discover, now).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(target: "discover", error = %e, "audit run record not created");
            None
        }
    };

    for section in Section::ALL {
        let policy = policies.get(section);
        let Some(discovery_policy) = policy.discovery.as_ref() else {
            continue;
        };

        // The synthetic per-section source row both owns the admitted items
        // and carries the interval gate in `last_fetched_at`.
        let source = match store
            .upsert_source(NewSource {
                url: format!("discovery://{section}"),
                section,
                name: format!("discovery ({section})"),
                kind: SourceKind::Discovery,
                country: None,
                trust_score: DISCOVERY_SOURCE_TRUST,
            })
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "discover", section = %section, error = %e, "discovery source upsert failed");
                continue;
            }
        };
        if let Some(last) = source.last_fetched_at {
            if now - last < Duration::hours(cfg.discovery.interval_hours) {
                continue;
            }
        }
        stats.sections_due += 1;
        if let Err(e) = store.record_fetch_attempt(source.id, now).await {
            tracing::warn!(target: "discover", error = %e, "interval gate not recorded");
        }

        // All providers in parallel; one failing provider costs nothing but
        // its own results.
        let mut merged: Vec<DiscoveryCandidate> = Vec::new();
        let results = join_all(provider_set.iter().map(|p| async move {
            (p.provider(), p.gather(section, discovery_policy).await)
        }))
        .await;
        for (provider, result) in results {
            stats.providers_queried += 1;
            match result {
                Ok(mut candidates) => merged.append(&mut candidates),
                Err(e) => {
                    stats.provider_errors += 1;
                    counter!("discover_provider_errors_total").increment(1);
                    tracing::warn!(target: "discover", %provider, error = %e, "provider failed");
                }
            }
        }
        stats.candidates += merged.len() as u32;

        // Dedup inside the pool (normalized url + title key), then against
        // storage.
        let mut seen_urls = HashSet::new();
        let mut seen_titles = HashSet::new();
        let mut pool: Vec<DiscoveryCandidate> = Vec::new();
        for cand in merged {
            if !seen_urls.insert(normalize_url(&cand.url)) || !seen_titles.insert(title_key(&cand.title))
            {
                stats.deduped += 1;
                continue;
            }
            pool.push(cand);
        }
        let urls: Vec<String> = pool.iter().map(|c| c.url.clone()).collect();
        let already_stored = match store.existing_urls(&urls).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(target: "discover", section = %section, error = %e, "existing-url check failed");
                skipped += pool.len() as u32;
                continue;
            }
        };
        let before = pool.len();
        pool.retain(|c| !already_stored.contains(&c.url));
        stats.deduped += (before - pool.len()) as u32;

        // Per-run total is also bounded by the section's remaining organic
        // day quota.
        let day_count = match store
            .count_items(&WindowQuery {
                section,
                field: section.window_field(),
                since: now - Duration::hours(24),
                kind: None,
            })
            .await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(target: "discover", section = %section, error = %e, "day count unavailable");
                skipped += pool.len() as u32;
                continue;
            }
        };
        let quota = (policy.daily_cap as u64).saturating_sub(day_count);
        let run_cap = (cfg.discovery.per_run_cap as u64).min(quota) as u32;

        // Score with the shared model; provider base trust stands in for
        // operator trust.
        let mut scored: Vec<(f32, DiscoveryCandidate)> = pool
            .into_iter()
            .map(|cand| {
                let age_hours = (now - cand.published_at).num_seconds() as f32 / 3600.0;
                let s = scoring::score(
                    &scoring::ScoreInput {
                        trust_score: cand.provider.base_trust(),
                        age_hours,
                        title: &cand.title,
                        snippet: &cand.snippet,
                        source_on_cooldown: false,
                    },
                    policy,
                    &cfg.weights,
                );
                (s, cand)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(b.1.published_at.cmp(&a.1.published_at))
        });

        let mut winners: HashSet<Provider> = HashSet::new();
        let mut section_added = 0u32;
        for (score, cand) in scored {
            if section_added >= run_cap || winners.contains(&cand.provider) {
                skipped += 1;
                continue;
            }
            let item = NewItem {
                url: cand.url.clone(),
                source_id: source.id,
                section,
                title: cand.title,
                summary: cand.snippet,
                country: None,
                topics: canonical_topics(&cand.raw_categories),
                score,
                published_at: cand.published_at,
                // refreshed so collection-time queries keep surfacing it
                created_at: now,
            };
            match store.upsert_item(item).await {
                Ok(_) => {
                    winners.insert(cand.provider);
                    counter!("discover_admitted_total").increment(1);
                    section_added += 1;
                }
                Err(e) => {
                    tracing::warn!(target: "discover", section = %section, error = %e, "item upsert failed");
                    skipped += 1;
                }
            }
        }
        added += section_added;

        if let Err(e) = store.record_fetch_ok(source.id, now).await {
            tracing::warn!(target: "discover", error = %e, "discovery ok not recorded");
        }
        match prune::prune_discovery(store, section, &cfg.discovery, now).await {
            Ok(n) => stats.pruned += n,
            Err(e) => {
                tracing::warn!(target: "discover", section = %section, error = %e, "discovery prune failed")
            }
        }
    }

    stats.duration_ms = started.elapsed().as_millis() as u64;
    counter!("discover_runs_total").increment(1);
    gauge!("discover_last_run_ts").set(now.timestamp() as f64);

    if let Some(id) = run_id {
        let message = format!(
            "{} sections due, {} candidates, {} provider errors",
            stats.sections_due, stats.candidates, stats.provider_errors
        );
        if let Err(e) = store.finish_run(id, true, added, skipped, &message).await {
            tracing::warn!(target: "discover", error = %e, "audit run record not finalized");
        }
    }
    tracing::info!(
        target: "discover",
        added,
        skipped,
        sections_due = stats.sections_due,
        candidates = stats.candidates,
        "discovery run finished"
    );

    DiscoverOutcome {
        ok: true,
        added,
        skipped,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization_strips_tracking_noise() {
        assert_eq!(
            normalize_url("HTTPS://Example.org/Story?utm_source=x&id=3#frag"),
            "https://example.org/Story?id=3"
        );
        assert_eq!(
            normalize_url("https://example.org/a/"),
            "https://example.org/a"
        );
    }

    #[test]
    fn title_keys_collapse_punctuation_and_case() {
        assert_eq!(
            title_key("Rust 1.80 — what's NEW?"),
            title_key("rust 1 80 what s new")
        );
    }
}
