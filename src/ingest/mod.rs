//! # Organic Ingestion
//! One `run_once` call per scheduler trigger: select a fair source
//! rotation, fetch it through a bounded worker pool under the run budget,
//! pool candidates per section, admit through the single-writer ledger,
//! backfill empty sections from the fallback pool, then prune.

pub mod admission;
pub mod fallback;
pub mod feed;
pub mod fetch;
pub mod prune;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};

use crate::config::AppConfig;
use crate::model::{IngestOutcome, IngestStats, RunKind, Section, Source, SourceKind};
use crate::policy::PolicyTable;
use crate::store::ContentStore;

use admission::{AdmissionLedger, Candidate};
use fetch::{FeedFetch, FetchError};
use feed::ParseError;
use scheduler::RunBudget;

enum WorkerError {
    Fetch(FetchError),
    Parse(ParseError),
}

enum WorkerStatus {
    /// Budget margin tripped before this source started.
    NotStarted,
    Done(Result<Vec<feed::FeedEntry>, WorkerError>),
}

/// Run one organic ingest cycle. Never panics, never retries a source
/// within the run; the only fatal path is failing to read the source
/// registry at the start.
pub async fn run_once(
    store: &dyn ContentStore,
    fetcher: &dyn FeedFetch,
    policies: &PolicyTable,
    cfg: &AppConfig,
) -> IngestOutcome {
    crate::metrics::ensure_described();
    let now = Utc::now();
    let budget = RunBudget::start(cfg);
    let mut stats = IngestStats::default();

    let run_id = match store.create_run(RunKind::Ingest, now).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, "audit run record not created");
            None
        }
    };

    // Registry read is the one fatal condition.
    let sources = match store.enabled_sources(SourceKind::Rss).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(target: "ingest", error = %e, "source registry unavailable, aborting run");
            return fail_run(store, run_id, &format!("registry read failed: {e}"), stats).await;
        }
    };
    // Same story for the ledger seed: without trustworthy counts every
    // admission decision would be a guess.
    let ledger = match AdmissionLedger::seed(store, cfg, now).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target: "ingest", error = %e, "window counts unavailable, aborting run");
            return fail_run(store, run_id, &format!("ledger seed failed: {e}"), stats).await;
        }
    };

    let selected = scheduler::select_rotation(sources, policies, cfg.max_sources_per_run);
    stats.selected = selected.len() as u32;

    // Fan-out fetch + parse across the worker pool; the budget check runs
    // before each source starts. Results fan back into this task, which is
    // the only writer of the ledger and the stats.
    let stopped_early = AtomicBool::new(false);
    let budget_ref = &budget;
    let stopped_ref = &stopped_early;
    let results: Vec<(Source, WorkerStatus)> = stream::iter(selected)
        .map(|source| async move {
            if budget_ref.inside_margin() {
                stopped_ref.store(true, Ordering::Relaxed);
                return (source, WorkerStatus::NotStarted);
            }
            let t0 = std::time::Instant::now();
            let outcome = fetch_and_parse(fetcher, &source.url, now).await;
            histogram!("source_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            (source, WorkerStatus::Done(outcome))
        })
        .buffer_unordered(cfg.fetch_concurrency)
        .collect()
        .await;
    stats.stopped_early = stopped_early.load(Ordering::Relaxed);

    let mut added = 0u32;
    let mut skipped = 0u32;
    let mut pools: HashMap<Section, Vec<Candidate>> = HashMap::new();

    for (source, status) in results {
        let outcome = match status {
            WorkerStatus::NotStarted => continue,
            WorkerStatus::Done(r) => r,
        };
        if let Err(e) = store.record_fetch_attempt(source.id, now).await {
            tracing::warn!(target: "ingest", error = %e, "fetch attempt not recorded");
        }
        match outcome {
            Ok(entries) => {
                stats.fetched_ok += 1;
                counter!("ingest_sources_fetched_total").increment(1);
                if let Err(e) = store.record_fetch_ok(source.id, now).await {
                    tracing::warn!(target: "ingest", error = %e, "fetch ok not recorded");
                }
                stats.candidates += entries.len() as u32;
                let pool = pools.entry(source.section).or_default();
                for entry in entries {
                    pool.push(Candidate {
                        source_id: source.id,
                        trust_score: source.trust_score,
                        country: source.country.clone(),
                        entry,
                        fixed_score: None,
                    });
                }
            }
            Err(err) => {
                match &err {
                    WorkerError::Fetch(e) => {
                        stats.fetch_failed += 1;
                        counter!("ingest_fetch_errors_total").increment(1);
                        tracing::warn!(target: "ingest", source = %crate::anon_hash(&source.url), error = %e, "source fetch failed");
                    }
                    WorkerError::Parse(e) => {
                        stats.parse_failed += 1;
                        counter!("ingest_parse_errors_total").increment(1);
                        tracing::warn!(target: "ingest", source = %crate::anon_hash(&source.url), error = %e, "feed unparseable");
                    }
                }
                skipped += 1;
                handle_source_failure(store, cfg, &source).await;
            }
        }
    }

    // Admission: once per section over its pooled, ranked candidates.
    for section in Section::ALL {
        let Some(pool) = pools.remove(&section) else {
            continue;
        };
        let policy = policies.get(section);
        let scored = admission::score_pool(pool, section, policy, &cfg.weights, &ledger, now);
        let (a, s) = admission::admit_ranked(store, &ledger, section, policy, scored, now).await;
        added += a;
        skipped += s;
    }

    // Fallback pool for sections whose trailing month is empty, unless the
    // run is already inside its safety margin.
    for section in Section::ALL {
        if ledger.month_count(section) > 0 {
            continue;
        }
        if budget.inside_margin() {
            stats.stopped_early = true;
            tracing::info!(target: "ingest", section = %section, "fallback skipped, budget margin reached");
            continue;
        }
        let policy = policies.get(section);
        let query = policy
            .fallback_query
            .clone()
            .unwrap_or_else(|| section.as_str().to_string());
        let pool = fallback::gather(fetcher, store, section, &query, now).await;
        if pool.is_empty() {
            continue;
        }
        stats.fallback_sections += 1;
        let scored = admission::score_pool(pool, section, policy, &cfg.weights, &ledger, now);
        let (a, s) = admission::admit_ranked(store, &ledger, section, policy, scored, now).await;
        added += a;
        skipped += s;
    }

    // Maintenance: rank-based cap pruning, retention, source recovery.
    for section in Section::ALL {
        match prune::prune_section(store, section, policies.get(section), now).await {
            Ok(n) => stats.pruned += n,
            Err(e) => {
                tracing::warn!(target: "ingest", section = %section, error = %e, "section prune failed")
            }
        }
    }
    match prune::global_retention_sweep(store, cfg.retention_horizon_days, now).await {
        Ok(n) => stats.expired += n,
        Err(e) => tracing::warn!(target: "ingest", error = %e, "retention sweep failed"),
    }
    if let Err(e) = prune::reenable_sources_sweep(store, cfg, now).await {
        tracing::warn!(target: "ingest", error = %e, "re-enable sweep failed");
    }

    stats.duration_ms = budget.elapsed_ms();
    counter!("ingest_runs_total").increment(1);
    gauge!("ingest_last_run_ts").set(now.timestamp() as f64);

    let message = format!(
        "fetched {}/{} sources, {} candidates, stopped_early={}",
        stats.fetched_ok, stats.selected, stats.candidates, stats.stopped_early
    );
    if let Some(id) = run_id {
        if let Err(e) = store.finish_run(id, true, added, skipped, &message).await {
            tracing::warn!(target: "ingest", error = %e, "audit run record not finalized");
        }
    }
    tracing::info!(
        target: "ingest",
        added,
        skipped,
        fetched_ok = stats.fetched_ok,
        fetch_failed = stats.fetch_failed,
        parse_failed = stats.parse_failed,
        pruned = stats.pruned,
        stopped_early = stats.stopped_early,
        "ingest run finished"
    );

    IngestOutcome {
        ok: true,
        added,
        skipped,
        stats,
    }
}

async fn fetch_and_parse(
    fetcher: &dyn FeedFetch,
    url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<feed::FeedEntry>, WorkerError> {
    let fetched = fetcher.fetch(url).await.map_err(WorkerError::Fetch)?;
    feed::parse(&fetched.bytes, &fetched.content_type, now).map_err(WorkerError::Parse)
}

/// Failure bookkeeping: bump the counter, and apply the optional
/// auto-disable policy once the threshold is crossed.
async fn handle_source_failure(store: &dyn ContentStore, cfg: &AppConfig, source: &Source) {
    let fails = match store.record_fetch_failure(source.id).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, "failure counter not recorded");
            return;
        }
    };
    if cfg.auto_disable && fails >= cfg.disable_after_fails {
        if let Err(e) = store.set_source_enabled(source.id, false).await {
            tracing::warn!(target: "ingest", error = %e, "auto-disable not applied");
        } else {
            tracing::warn!(
                target: "ingest",
                source = %crate::anon_hash(&source.url),
                fails,
                "source auto-disabled"
            );
        }
    }
}

async fn fail_run(
    store: &dyn ContentStore,
    run_id: Option<crate::model::RunId>,
    message: &str,
    stats: IngestStats,
) -> IngestOutcome {
    if let Some(id) = run_id {
        if let Err(e) = store.finish_run(id, false, 0, 0, message).await {
            tracing::warn!(target: "ingest", error = %e, "failed run record not finalized");
        }
    }
    IngestOutcome {
        ok: false,
        added: 0,
        skipped: 0,
        stats,
    }
}
