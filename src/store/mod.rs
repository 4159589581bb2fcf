//! # Storage Collaborator
//! The persistence engine itself is external; this module defines exactly
//! the operations the engine consumes (upsert-by-url, filtered find-many,
//! window-scoped counts, timestamp/counter updates, delete-many, audit
//! records) plus the in-memory implementation used by the binary default
//! and the test suite.

pub mod memory;

pub use memory::MemoryStore;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Item, ItemId, NewItem, NewSource, RunId, RunKind, Section, Source, SourceId, SourceKind,
    UpsertOutcome, WindowField,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The source registry cannot be read at all. The only fatal condition:
    /// the orchestrator aborts the run and records it as failed.
    #[error("source registry unavailable: {0}")]
    Unavailable(String),
    /// Any other storage failure. Local: the affected candidate or source is
    /// counted as skipped and the run continues.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Window-scoped item query. `kind` narrows to items owned by sources of
/// that kind (the discovery path prunes only its own rows).
#[derive(Debug, Clone)]
pub struct WindowQuery {
    pub section: Section,
    pub field: WindowField,
    pub since: DateTime<Utc>,
    pub kind: Option<SourceKind>,
}

/// Operations consumed from the storage engine.
///
/// Upserts are keyed by `url`; a unique-constraint conflict on an existing
/// URL must surface as `Ok(UpsertOutcome::Updated)`, never as an error.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- sources ---
    async fn upsert_source(&self, src: NewSource) -> Result<Source, StoreError>;
    async fn source_by_url(&self, url: &str) -> Result<Option<Source>, StoreError>;
    async fn enabled_sources(&self, kind: SourceKind) -> Result<Vec<Source>, StoreError>;
    async fn disabled_sources(&self, kind: SourceKind) -> Result<Vec<Source>, StoreError>;
    async fn record_fetch_attempt(&self, id: SourceId, at: DateTime<Utc>)
        -> Result<(), StoreError>;
    /// Stamps `last_ok_at` and resets `consecutive_fails`.
    async fn record_fetch_ok(&self, id: SourceId, at: DateTime<Utc>) -> Result<(), StoreError>;
    /// Increments `consecutive_fails` and returns the new value.
    async fn record_fetch_failure(&self, id: SourceId) -> Result<u32, StoreError>;
    async fn set_source_enabled(&self, id: SourceId, enabled: bool) -> Result<(), StoreError>;
    /// Re-enable an auto-disabled source and zero its fail counter.
    async fn reenable_source(&self, id: SourceId) -> Result<(), StoreError>;

    // --- items ---
    async fn upsert_item(&self, item: NewItem) -> Result<UpsertOutcome, StoreError>;
    async fn count_items(&self, q: &WindowQuery) -> Result<u64, StoreError>;
    async fn items_in_window(&self, q: &WindowQuery) -> Result<Vec<Item>, StoreError>;
    /// URLs of items admitted (collected) to `section` since `since`.
    async fn urls_admitted_since(
        &self,
        section: Section,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>, StoreError>;
    /// Sources that won an admission in `section` since `since`.
    async fn sources_admitted_since(
        &self,
        section: Section,
        since: DateTime<Utc>,
    ) -> Result<HashSet<SourceId>, StoreError>;
    /// Which of the given URLs already exist, any section.
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, StoreError>;
    async fn delete_items(&self, ids: &[ItemId]) -> Result<u64, StoreError>;
    /// Bulk delete by age on `field`, optionally narrowed to a section
    /// and/or source kind.
    async fn delete_items_before(
        &self,
        section: Option<Section>,
        field: WindowField,
        before: DateTime<Utc>,
        kind: Option<SourceKind>,
    ) -> Result<u64, StoreError>;
    /// Most recently collected items, for the debug surface.
    async fn recent_items(&self, limit: usize) -> Result<Vec<Item>, StoreError>;

    // --- audit ---
    async fn create_run(&self, kind: RunKind, started_at: DateTime<Utc>)
        -> Result<RunId, StoreError>;
    async fn finish_run(
        &self,
        id: RunId,
        ok: bool,
        added: u32,
        skipped: u32,
        message: &str,
    ) -> Result<(), StoreError>;
}
