//! # Admission Control
//! Per-run window/cap tracker and dedup/cooldown guard.
//!
//! Counts are recomputed from storage at every run start; in-memory state is
//! never carried across runs, so a crashed or partial run cannot drift the
//! caps. All mutations go through [`AdmissionLedger`], which the
//! orchestrator task owns exclusively; fetch workers only ever produce
//! candidates.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;

use crate::config::AppConfig;
use crate::ingest::feed::FeedEntry;
use crate::labels::canonical_topics;
use crate::model::{NewItem, Section, SourceId};
use crate::policy::SectionPolicy;
use crate::scoring::{self, ScoreWeights};
use crate::store::{ContentStore, StoreError, WindowQuery};

/// A not-yet-admitted item, pooled per section for one run.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source_id: SourceId,
    pub trust_score: u8,
    pub country: Option<String>,
    pub entry: FeedEntry,
    /// Fallback-pool items bypass the scoring model with a fixed score.
    pub fixed_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    RepeatUrl,
    DayCapReached,
    WeekCapReached,
    MonthCapReached,
}

#[derive(Debug, Default, Clone)]
struct SectionLedger {
    day: u64,
    week: u64,
    month: u64,
    recent_urls: HashSet<String>,
    recent_sources: HashSet<SourceId>,
}

/// Rolling per-section counts plus the no-repeat and cooldown guard sets,
/// seeded from storage, updated as admissions land.
pub struct AdmissionLedger {
    sections: Mutex<HashMap<Section, SectionLedger>>,
}

impl AdmissionLedger {
    /// Recompute every section's day/week/month counts and guard sets from
    /// storage. Guard sets are seeded from storage too, not just from the
    /// current run, so a URL admitted by the previous run still blocks.
    pub async fn seed(
        store: &dyn ContentStore,
        cfg: &AppConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let mut sections = HashMap::new();
        for section in Section::ALL {
            let field = section.window_field();
            let count = |since: DateTime<Utc>| WindowQuery {
                section,
                field,
                since,
                kind: None,
            };
            let ledger = SectionLedger {
                day: store.count_items(&count(now - Duration::hours(24))).await?,
                week: store.count_items(&count(now - Duration::days(7))).await?,
                month: store.count_items(&count(now - Duration::days(30))).await?,
                recent_urls: store
                    .urls_admitted_since(section, now - Duration::hours(cfg.no_repeat_hours))
                    .await?,
                recent_sources: store
                    .sources_admitted_since(section, now - Duration::hours(cfg.cooldown_hours))
                    .await?,
            };
            sections.insert(section, ledger);
        }
        Ok(Self {
            sections: Mutex::new(sections),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Section, SectionLedger>> {
        self.sections.lock().expect("admission ledger mutex poisoned")
    }

    pub fn month_count(&self, section: Section) -> u64 {
        self.lock().get(&section).map(|l| l.month).unwrap_or(0)
    }

    pub fn source_on_cooldown(&self, section: Section, source: SourceId) -> bool {
        self.lock()
            .get(&section)
            .is_some_and(|l| l.recent_sources.contains(&source))
    }

    /// Cap + no-repeat check, no mutation. The orchestrator commits
    /// separately once the upsert lands.
    pub fn check(
        &self,
        section: Section,
        url: &str,
        policy: &SectionPolicy,
    ) -> Result<(), Rejection> {
        let g = self.lock();
        let Some(l) = g.get(&section) else {
            return Ok(());
        };
        if l.recent_urls.contains(url) {
            return Err(Rejection::RepeatUrl);
        }
        if l.day >= policy.daily_cap as u64 {
            return Err(Rejection::DayCapReached);
        }
        if l.week >= policy.weekly_cap as u64 {
            return Err(Rejection::WeekCapReached);
        }
        if l.month >= policy.monthly_cap as u64 {
            return Err(Rejection::MonthCapReached);
        }
        Ok(())
    }

    /// Record a landed admission so every later decision in this run
    /// observes it.
    pub fn commit(&self, section: Section, url: &str, source: SourceId) {
        let mut g = self.lock();
        let l = g.entry(section).or_default();
        l.day += 1;
        l.week += 1;
        l.month += 1;
        l.recent_urls.insert(url.to_string());
        l.recent_sources.insert(source);
    }
}

/// Score one section's pooled candidates. Fallback items keep their fixed
/// score; everything else runs through the composite model, including the
/// cooldown diversity penalty.
pub fn score_pool(
    pool: Vec<Candidate>,
    section: Section,
    policy: &SectionPolicy,
    weights: &ScoreWeights,
    ledger: &AdmissionLedger,
    now: DateTime<Utc>,
) -> Vec<ScoredCandidate> {
    pool.into_iter()
        .map(|candidate| {
            let score = match candidate.fixed_score {
                Some(s) => s,
                None => {
                    let age_hours = (now - candidate.entry.published_at).num_seconds() as f32 / 3600.0;
                    scoring::score(
                        &scoring::ScoreInput {
                            trust_score: candidate.trust_score,
                            age_hours,
                            title: &candidate.entry.title,
                            snippet: &candidate.entry.snippet,
                            source_on_cooldown: ledger
                                .source_on_cooldown(section, candidate.source_id),
                        },
                        policy,
                        weights,
                    )
                }
            };
            ScoredCandidate { candidate, score }
        })
        .collect()
}

/// Admit from a section's scored pool: rank `(score desc, published_at
/// desc)`, take the first candidate that clears the guards and caps, stop at
/// `per_run_cap`. Returns `(admitted, skipped)`.
pub async fn admit_ranked(
    store: &dyn ContentStore,
    ledger: &AdmissionLedger,
    section: Section,
    policy: &SectionPolicy,
    mut pool: Vec<ScoredCandidate>,
    now: DateTime<Utc>,
) -> (u32, u32) {
    pool.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.candidate.entry.published_at.cmp(&a.candidate.entry.published_at))
    });

    let mut admitted = 0u32;
    let mut skipped = 0u32;

    for sc in pool {
        if admitted >= policy.per_run_cap {
            skipped += 1;
            continue;
        }
        if let Err(rejection) = ledger.check(section, &sc.candidate.entry.url, policy) {
            tracing::debug!(target: "ingest", section = %section, ?rejection, "candidate rejected");
            skipped += 1;
            continue;
        }

        let entry = &sc.candidate.entry;
        let new_item = NewItem {
            url: entry.url.clone(),
            source_id: sc.candidate.source_id,
            section,
            title: entry.title.clone(),
            summary: entry.snippet.clone(),
            country: sc.candidate.country.clone(),
            topics: canonical_topics(&entry.raw_categories),
            score: sc.score,
            published_at: entry.published_at,
            created_at: now,
        };

        // Upsert keyed by url: an existing row is success, not an error.
        match store.upsert_item(new_item).await {
            Ok(_) => {
                ledger.commit(section, &entry.url, sc.candidate.source_id);
                counter!("ingest_admitted_total").increment(1);
                admitted += 1;
            }
            Err(e) => {
                tracing::warn!(target: "ingest", section = %section, error = %e, "item upsert failed");
                skipped += 1;
            }
        }
    }

    (admitted, skipped)
}
