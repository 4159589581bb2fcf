//! Code-hosting release feeds (Atom). Reuses the feed parser; the quality
//! rule here is "stable releases only".

use async_trait::async_trait;
use chrono::Utc;

use crate::ingest::feed;
use crate::ingest::fetch::FeedFetch;
use crate::model::Section;
use crate::policy::DiscoveryPolicy;

use super::{DiscoveryCandidate, DiscoveryProvider, Provider};

const PRERELEASE_MARKERS: [&str; 6] = ["alpha", "beta", "rc", "nightly", "preview", "dev"];

pub struct ReleaseFeedProvider<F> {
    fetcher: F,
}

impl<F: FeedFetch> ReleaseFeedProvider<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

/// True for tags like `v2.0.0-rc1`, `1.80.0-beta.3`, `nightly-2025-06-01`.
pub fn is_prerelease(title: &str) -> bool {
    let t = title.to_lowercase();
    PRERELEASE_MARKERS.iter().any(|m| {
        t.split(|c: char| !c.is_alphanumeric())
            .any(|word| word == *m || (word.starts_with(*m) && word[m.len()..].chars().all(|c| c.is_ascii_digit())))
    })
}

/// `https://github.com/rust-lang/rust/releases.atom` → `rust-lang/rust`.
fn repo_label(feed_url: &str) -> Option<String> {
    let rest = feed_url.split("://").nth(1)?;
    let mut parts = rest.split('/');
    let _host = parts.next()?;
    let owner = parts.next()?;
    let repo = parts.next()?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}

#[async_trait]
impl<F: FeedFetch> DiscoveryProvider for ReleaseFeedProvider<F> {
    fn provider(&self) -> Provider {
        Provider::Releases
    }

    async fn gather(
        &self,
        _section: Section,
        policy: &DiscoveryPolicy,
    ) -> anyhow::Result<Vec<DiscoveryCandidate>> {
        let now = Utc::now();
        let mut out = Vec::new();
        for feed_url in &policy.release_feeds {
            let fetched = match self.fetcher.fetch(feed_url).await {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(target: "discover", error = %e, "release feed fetch failed");
                    continue;
                }
            };
            let entries = match feed::parse(&fetched.bytes, &fetched.content_type, now) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(target: "discover", error = %e, "release feed unparseable");
                    continue;
                }
            };
            let label = repo_label(feed_url);
            for entry in entries {
                if entry.title.is_empty() || is_prerelease(&entry.title) {
                    continue;
                }
                let title = match &label {
                    Some(repo) => format!("{repo} {}", entry.title),
                    None => entry.title.clone(),
                };
                out.push(DiscoveryCandidate {
                    provider: Provider::Releases,
                    title,
                    url: entry.url,
                    snippet: entry.snippet,
                    published_at: entry.published_at,
                    raw_categories: entry.raw_categories,
                });
            }
        }
        Ok(out)
    }
}
