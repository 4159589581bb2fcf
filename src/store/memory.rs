//! In-memory [`ContentStore`]. Good enough for a single process: the binary
//! default, and the backing store for every test. A persistent engine drops
//! in behind the same trait.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    IngestRun, Item, ItemId, NewItem, NewSource, RunId, RunKind, Section, Source, SourceId,
    SourceKind, UpsertOutcome, WindowField,
};

use super::{ContentStore, StoreError, WindowQuery};

#[derive(Default)]
struct Inner {
    sources: HashMap<SourceId, Source>,
    source_id_by_url: HashMap<String, SourceId>,
    items: HashMap<ItemId, Item>,
    item_id_by_url: HashMap<String, ItemId>,
    runs: HashMap<RunId, IngestRun>,
    next_source_id: SourceId,
    next_item_id: ItemId,
    next_run_id: RunId,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn window_ts(item: &Item, field: WindowField) -> DateTime<Utc> {
    match field {
        WindowField::PublishedAt => item.published_at,
        WindowField::CreatedAt => item.created_at,
    }
}

impl Inner {
    fn item_kind(&self, item: &Item) -> Option<SourceKind> {
        self.sources.get(&item.source_id).map(|s| s.kind)
    }

    fn matches(&self, item: &Item, q: &WindowQuery) -> bool {
        item.section == q.section
            && window_ts(item, q.field) >= q.since
            && q.kind.map_or(true, |k| self.item_kind(item) == Some(k))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_source(&self, src: NewSource) -> Result<Source, StoreError> {
        let mut g = self.lock();
        if let Some(&id) = g.source_id_by_url.get(&src.url) {
            let row = g.sources.get_mut(&id).expect("url index points at row");
            row.section = src.section;
            row.name = src.name;
            row.kind = src.kind;
            row.country = src.country;
            row.trust_score = src.trust_score;
            return Ok(row.clone());
        }
        g.next_source_id += 1;
        let id = g.next_source_id;
        let row = Source {
            id,
            url: src.url.clone(),
            section: src.section,
            name: src.name,
            kind: src.kind,
            country: src.country,
            trust_score: src.trust_score,
            enabled: true,
            last_fetched_at: None,
            last_ok_at: None,
            consecutive_fails: 0,
            created_at: Utc::now(),
        };
        g.source_id_by_url.insert(src.url, id);
        g.sources.insert(id, row.clone());
        Ok(row)
    }

    async fn source_by_url(&self, url: &str) -> Result<Option<Source>, StoreError> {
        let g = self.lock();
        Ok(g.source_id_by_url
            .get(url)
            .and_then(|id| g.sources.get(id))
            .cloned())
    }

    async fn enabled_sources(&self, kind: SourceKind) -> Result<Vec<Source>, StoreError> {
        let g = self.lock();
        Ok(g.sources
            .values()
            .filter(|s| s.enabled && s.kind == kind)
            .cloned()
            .collect())
    }

    async fn disabled_sources(&self, kind: SourceKind) -> Result<Vec<Source>, StoreError> {
        let g = self.lock();
        Ok(g.sources
            .values()
            .filter(|s| !s.enabled && s.kind == kind)
            .cloned()
            .collect())
    }

    async fn record_fetch_attempt(
        &self,
        id: SourceId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut g = self.lock();
        if let Some(s) = g.sources.get_mut(&id) {
            s.last_fetched_at = Some(at);
        }
        Ok(())
    }

    async fn record_fetch_ok(&self, id: SourceId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut g = self.lock();
        if let Some(s) = g.sources.get_mut(&id) {
            s.last_ok_at = Some(at);
            s.consecutive_fails = 0;
        }
        Ok(())
    }

    async fn record_fetch_failure(&self, id: SourceId) -> Result<u32, StoreError> {
        let mut g = self.lock();
        match g.sources.get_mut(&id) {
            Some(s) => {
                s.consecutive_fails += 1;
                Ok(s.consecutive_fails)
            }
            None => Err(StoreError::Backend(format!("unknown source {id}"))),
        }
    }

    async fn set_source_enabled(&self, id: SourceId, enabled: bool) -> Result<(), StoreError> {
        let mut g = self.lock();
        if let Some(s) = g.sources.get_mut(&id) {
            s.enabled = enabled;
        }
        Ok(())
    }

    async fn reenable_source(&self, id: SourceId) -> Result<(), StoreError> {
        let mut g = self.lock();
        if let Some(s) = g.sources.get_mut(&id) {
            s.enabled = true;
            s.consecutive_fails = 0;
        }
        Ok(())
    }

    async fn upsert_item(&self, item: NewItem) -> Result<UpsertOutcome, StoreError> {
        let mut g = self.lock();
        if let Some(&id) = g.item_id_by_url.get(&item.url) {
            let row = g.items.get_mut(&id).expect("url index points at row");
            row.source_id = item.source_id;
            row.section = item.section;
            row.title = item.title;
            row.summary = item.summary;
            row.country = item.country;
            row.topics = item.topics;
            row.score = item.score;
            row.published_at = item.published_at;
            row.created_at = item.created_at;
            return Ok(UpsertOutcome::Updated);
        }
        g.next_item_id += 1;
        let id = g.next_item_id;
        g.item_id_by_url.insert(item.url.clone(), id);
        g.items.insert(
            id,
            Item {
                id,
                url: item.url,
                source_id: item.source_id,
                section: item.section,
                title: item.title,
                summary: item.summary,
                country: item.country,
                topics: item.topics,
                score: item.score,
                published_at: item.published_at,
                created_at: item.created_at,
            },
        );
        Ok(UpsertOutcome::Inserted)
    }

    async fn count_items(&self, q: &WindowQuery) -> Result<u64, StoreError> {
        let g = self.lock();
        Ok(g.items.values().filter(|i| g.matches(i, q)).count() as u64)
    }

    async fn items_in_window(&self, q: &WindowQuery) -> Result<Vec<Item>, StoreError> {
        let g = self.lock();
        Ok(g.items
            .values()
            .filter(|i| g.matches(i, q))
            .cloned()
            .collect())
    }

    async fn urls_admitted_since(
        &self,
        section: Section,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>, StoreError> {
        let g = self.lock();
        Ok(g.items
            .values()
            .filter(|i| i.section == section && i.created_at >= since)
            .map(|i| i.url.clone())
            .collect())
    }

    async fn sources_admitted_since(
        &self,
        section: Section,
        since: DateTime<Utc>,
    ) -> Result<HashSet<SourceId>, StoreError> {
        let g = self.lock();
        Ok(g.items
            .values()
            .filter(|i| i.section == section && i.created_at >= since)
            .map(|i| i.source_id)
            .collect())
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, StoreError> {
        let g = self.lock();
        Ok(urls
            .iter()
            .filter(|u| g.item_id_by_url.contains_key(*u))
            .cloned()
            .collect())
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<u64, StoreError> {
        let mut g = self.lock();
        let mut deleted = 0;
        for id in ids {
            if let Some(item) = g.items.remove(id) {
                g.item_id_by_url.remove(&item.url);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_items_before(
        &self,
        section: Option<Section>,
        field: WindowField,
        before: DateTime<Utc>,
        kind: Option<SourceKind>,
    ) -> Result<u64, StoreError> {
        let mut g = self.lock();
        let doomed: Vec<ItemId> = g
            .items
            .values()
            .filter(|i| {
                section.map_or(true, |s| i.section == s)
                    && window_ts(i, field) < before
                    && kind.map_or(true, |k| g.item_kind(i) == Some(k))
            })
            .map(|i| i.id)
            .collect();
        for id in &doomed {
            if let Some(item) = g.items.remove(id) {
                g.item_id_by_url.remove(&item.url);
            }
        }
        Ok(doomed.len() as u64)
    }

    async fn recent_items(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let g = self.lock();
        let mut items: Vec<Item> = g.items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        Ok(items)
    }

    async fn create_run(
        &self,
        kind: RunKind,
        started_at: DateTime<Utc>,
    ) -> Result<RunId, StoreError> {
        let mut g = self.lock();
        g.next_run_id += 1;
        let id = g.next_run_id;
        g.runs.insert(
            id,
            IngestRun {
                id,
                kind,
                started_at,
                finished_at: None,
                ok: false,
                added: 0,
                skipped: 0,
                message: String::new(),
            },
        );
        Ok(id)
    }

    async fn finish_run(
        &self,
        id: RunId,
        ok: bool,
        added: u32,
        skipped: u32,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut g = self.lock();
        if let Some(run) = g.runs.get_mut(&id) {
            run.finished_at = Some(Utc::now());
            run.ok = ok;
            run.added = added;
            run.skipped = skipped;
            run.message = message.to_string();
        }
        Ok(())
    }
}
