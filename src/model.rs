//! # Data Model
//! Records shared by the ingestion and discovery paths: sources, items,
//! audit runs, and the outcome structs returned by the orchestrator
//! entrypoints. Pure data, no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SourceId = u64;
pub type ItemId = u64;
pub type RunId = u64;

/// Topical sections items are admitted into.
///
/// `History` is the one section whose window arithmetic runs on
/// `created_at` instead of `published_at`: curated historical content can be
/// arbitrarily old, so publication dates are useless for windowing there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Global,
    Business,
    Tech,
    Science,
    Culture,
    Sport,
    History,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Global,
        Section::Business,
        Section::Tech,
        Section::Science,
        Section::Culture,
        Section::Sport,
        Section::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Global => "global",
            Section::Business => "business",
            Section::Tech => "tech",
            Section::Science => "science",
            Section::Culture => "culture",
            Section::Sport => "sport",
            Section::History => "history",
        }
    }

    /// Which timestamp field this section's window counts run on.
    pub fn window_field(&self) -> WindowField {
        match self {
            Section::History => WindowField::CreatedAt,
            _ => WindowField::PublishedAt,
        }
    }
}

impl std::str::FromStr for Section {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Section::Global),
            "business" => Ok(Section::Business),
            "tech" => Ok(Section::Tech),
            "science" => Ok(Section::Science),
            "culture" => Ok(Section::Culture),
            "sport" => Ok(Section::Sport),
            "history" => Ok(Section::History),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp field used for window membership and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowField {
    PublishedAt,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Fallback,
    Discovery,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Fallback => "fallback",
            SourceKind::Discovery => "discovery",
        }
    }
}

/// A registered content source. Identity is the feed `url`.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: SourceId,
    pub url: String,
    pub section: Section,
    pub name: String,
    pub kind: SourceKind,
    pub country: Option<String>,
    /// Operator-assigned credibility, 0..=100.
    pub trust_score: u8,
    pub enabled: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub consecutive_fails: u32,
    pub created_at: DateTime<Utc>,
}

/// Insert/refresh payload for a source row, keyed by `url`.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub url: String,
    pub section: Section,
    pub name: String,
    pub kind: SourceKind,
    pub country: Option<String>,
    pub trust_score: u8,
}

/// An admitted content item. Identity is `url` (the global dedup key).
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub url: String,
    pub source_id: SourceId,
    pub section: Section,
    pub title: String,
    pub summary: String,
    pub country: Option<String>,
    /// At most two canonical topic codes, in feed order.
    pub topics: Vec<String>,
    pub score: f32,
    pub published_at: DateTime<Utc>,
    /// Collected-at timestamp; refreshed on discovery re-admission.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub url: String,
    pub source_id: SourceId,
    pub section: Section,
    pub title: String,
    pub summary: String,
    pub country: Option<String>,
    pub topics: Vec<String>,
    pub score: f32,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Result of an upsert-by-url. An already-existing row is success, not an
/// error (idempotent admission).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Ingest,
    Discover,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Ingest => "ingest",
            RunKind::Discover => "discover",
        }
    }
}

/// Audit record, one per orchestrator invocation. Created at start,
/// finalized at end, never partially deleted.
#[derive(Debug, Clone, Serialize)]
pub struct IngestRun {
    pub id: RunId,
    pub kind: RunKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub ok: bool,
    pub added: u32,
    pub skipped: u32,
    pub message: String,
}

/// Diagnostics for one organic ingest run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub selected: u32,
    pub fetched_ok: u32,
    pub fetch_failed: u32,
    pub parse_failed: u32,
    pub candidates: u32,
    pub fallback_sections: u32,
    pub pruned: u64,
    pub expired: u64,
    pub stopped_early: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub ok: bool,
    pub added: u32,
    pub skipped: u32,
    pub stats: IngestStats,
}

/// Diagnostics for one discovery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverStats {
    pub sections_due: u32,
    pub providers_queried: u32,
    pub provider_errors: u32,
    pub candidates: u32,
    pub deduped: u32,
    pub pruned: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverOutcome {
    pub ok: bool,
    pub added: u32,
    pub skipped: u32,
    pub stats: DiscoverStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_windows_on_created_at() {
        assert_eq!(Section::History.window_field(), WindowField::CreatedAt);
        for s in Section::ALL {
            if s != Section::History {
                assert_eq!(s.window_field(), WindowField::PublishedAt);
            }
        }
    }

    #[test]
    fn section_roundtrips_through_str() {
        for s in Section::ALL {
            assert_eq!(s.as_str().parse::<Section>().unwrap(), s);
        }
        assert!("world".parse::<Section>().is_err());
    }
}
