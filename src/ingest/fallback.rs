//! # Fallback Pool
//! Emergency secondary path for sections whose trailing month is empty.
//! Queries one or two public aggregator feeds and hands back candidates
//! carrying a fixed score; they still pass through normal admission, so
//! caps and the no-repeat guard keep applying.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::ingest::admission::Candidate;
use crate::ingest::feed;
use crate::ingest::fetch::FeedFetch;
use crate::model::{NewSource, Section, SourceKind};
use crate::store::ContentStore;

/// Score assigned to every fallback item, bypassing the composite model.
pub const FALLBACK_FIXED_SCORE: f32 = 0.50;

const FALLBACK_TRUST: u8 = 50;

pub fn primary_url(query: &str) -> String {
    format!(
        "https://news.google.com/rss/search?q={}&hl=en-US&gl=US&ceid=US:en",
        encode_query(query)
    )
}

pub fn secondary_url(query: &str) -> String {
    format!("https://www.bing.com/news/search?q={}&format=rss", encode_query(query))
}

fn encode_query(q: &str) -> String {
    q.split_whitespace().collect::<Vec<_>>().join("+")
}

/// Fetch fallback candidates for one empty section: primary aggregator
/// first, secondary only when the primary returns nothing. Errors are
/// local: a failed aggregator yields an empty pool, never a failed run.
pub async fn gather(
    fetcher: &dyn FeedFetch,
    store: &dyn ContentStore,
    section: Section,
    query: &str,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let source = match store
        .upsert_source(NewSource {
            url: format!("fallback://{section}"),
            section,
            name: format!("fallback pool ({section})"),
            kind: SourceKind::Fallback,
            country: None,
            trust_score: FALLBACK_TRUST,
        })
        .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(target: "ingest", section = %section, error = %e, "fallback source upsert failed");
            return Vec::new();
        }
    };

    counter!("ingest_fallback_queries_total").increment(1);

    let mut entries = fetch_entries(fetcher, &primary_url(query), now).await;
    if entries.is_empty() {
        entries = fetch_entries(fetcher, &secondary_url(query), now).await;
    }

    entries
        .into_iter()
        .map(|entry| Candidate {
            source_id: source.id,
            trust_score: FALLBACK_TRUST,
            country: None,
            entry,
            fixed_score: Some(FALLBACK_FIXED_SCORE),
        })
        .collect()
}

async fn fetch_entries(
    fetcher: &dyn FeedFetch,
    url: &str,
    now: DateTime<Utc>,
) -> Vec<feed::FeedEntry> {
    let fetched = match fetcher.fetch(url).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, "fallback aggregator fetch failed");
            return Vec::new();
        }
    };
    match feed::parse(&fetched.bytes, &fetched.content_type, now) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, "fallback aggregator parse failed");
            Vec::new()
        }
    }
}
