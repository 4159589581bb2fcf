//! # Retention & Cap Pruner
//! Post-run maintenance. Admission checks counts; pruning re-checks ranks,
//! which is what makes caps retroactive: a high-score newcomer can evict an
//! older lower-score row that admission let in. The two phases stay
//! separate on purpose.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;

use crate::config::{AppConfig, DiscoveryConfig};
use crate::model::{ItemId, Section, SourceKind, WindowField};
use crate::policy::SectionPolicy;
use crate::store::{ContentStore, StoreError, WindowQuery};

/// Rank one window `(score desc, created_at desc)`, keep the top `cap` plus
/// everything in `always_keep`, delete the rest. Returns the deleted count
/// and the kept set for the next, wider window.
async fn prune_ranked(
    store: &dyn ContentStore,
    q: WindowQuery,
    cap: usize,
    always_keep: &HashSet<ItemId>,
) -> Result<(u64, HashSet<ItemId>), StoreError> {
    let mut items = store.items_in_window(&q).await?;
    items.sort_by(|a, b| b.score.total_cmp(&a.score).then(b.created_at.cmp(&a.created_at)));

    let mut kept = always_keep.clone();
    for item in items.iter().take(cap) {
        kept.insert(item.id);
    }
    let doomed: Vec<ItemId> = items
        .iter()
        .filter(|i| !kept.contains(&i.id))
        .map(|i| i.id)
        .collect();
    let deleted = store.delete_items(&doomed).await?;
    Ok((deleted, kept))
}

/// Enforce one section's caps by rank: day window to `daily_cap`, week
/// window to `weekly_cap` (day keepers always survive), and for `history`
/// only, month window to `monthly_cap`. Finishes with the section's own
/// retention sweep.
pub async fn prune_section(
    store: &dyn ContentStore,
    section: Section,
    policy: &SectionPolicy,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let field = section.window_field();
    let q = |since: DateTime<Utc>| WindowQuery {
        section,
        field,
        since,
        kind: None,
    };

    let (day_deleted, day_kept) = prune_ranked(
        store,
        q(now - Duration::hours(24)),
        policy.daily_cap as usize,
        &HashSet::new(),
    )
    .await?;
    let (week_deleted, week_kept) = prune_ranked(
        store,
        q(now - Duration::days(7)),
        policy.weekly_cap as usize,
        &day_kept,
    )
    .await?;
    let month_deleted = if section == Section::History {
        prune_ranked(
            store,
            q(now - Duration::days(30)),
            policy.monthly_cap as usize,
            &week_kept,
        )
        .await?
        .0
    } else {
        0
    };

    let aged_out = store
        .delete_items_before(
            Some(section),
            field,
            now - Duration::days(policy.retention_days as i64),
            None,
        )
        .await?;

    let total = day_deleted + week_deleted + month_deleted + aged_out;
    counter!("ingest_pruned_total").increment(total);
    Ok(total)
}

/// Unconditional global sweep: anything collected before the fixed horizon
/// goes, regardless of section.
pub async fn global_retention_sweep(
    store: &dyn ContentStore,
    horizon_days: i64,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let expired = store
        .delete_items_before(None, WindowField::CreatedAt, now - Duration::days(horizon_days), None)
        .await?;
    counter!("ingest_expired_total").increment(expired);
    Ok(expired)
}

/// The discovery path's own, smaller caps and 7-day retention, scoped to
/// items owned by discovery sources. Runs on `created_at`: discovery rows
/// refresh their collection time on admission.
pub async fn prune_discovery(
    store: &dyn ContentStore,
    section: Section,
    dc: &DiscoveryConfig,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let q = |since: DateTime<Utc>| WindowQuery {
        section,
        field: WindowField::CreatedAt,
        since,
        kind: Some(SourceKind::Discovery),
    };

    let (day_deleted, day_kept) = prune_ranked(
        store,
        q(now - Duration::hours(24)),
        dc.daily_cap as usize,
        &HashSet::new(),
    )
    .await?;
    let (week_deleted, _) = prune_ranked(
        store,
        q(now - Duration::days(7)),
        dc.weekly_cap as usize,
        &day_kept,
    )
    .await?;
    let aged_out = store
        .delete_items_before(
            Some(section),
            WindowField::CreatedAt,
            now - Duration::days(dc.retention_days),
            Some(SourceKind::Discovery),
        )
        .await?;

    Ok(day_deleted + week_deleted + aged_out)
}

/// Maintenance sweep letting auto-disabled sources recover: anything the
/// failure threshold switched off, whose quarantine has elapsed, comes back
/// with a clean counter. Manually disabled sources (below threshold) are
/// left alone.
pub async fn reenable_sources_sweep(
    store: &dyn ContentStore,
    cfg: &AppConfig,
    now: DateTime<Utc>,
) -> Result<u32, StoreError> {
    if !cfg.auto_disable {
        return Ok(0);
    }
    let quarantine_end = now - Duration::hours(cfg.reenable_after_hours);
    let mut restored = 0;
    for source in store.disabled_sources(SourceKind::Rss).await? {
        let auto_disabled = source.consecutive_fails >= cfg.disable_after_fails;
        let quarantine_over = source.last_fetched_at.map_or(true, |t| t < quarantine_end);
        if auto_disabled && quarantine_over {
            store.reenable_source(source.id).await?;
            restored += 1;
            tracing::info!(target: "ingest", url = %source.url, "re-enabled source after quarantine");
        }
    }
    Ok(restored)
}
