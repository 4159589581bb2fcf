//! Discovery providers: independent, lower-frequency candidate sources with
//! provider-specific quality rules. Each provider returns raw candidates;
//! merging, dedup, scoring, and admission happen in the orchestrator.

pub mod releases;
pub mod social;
pub mod video;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::ingest::fetch::HttpFeedFetcher;
use crate::model::Section;
use crate::policy::DiscoveryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Releases,
    Video,
    Social,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Releases => "releases",
            Provider::Video => "video",
            Provider::Social => "social",
        }
    }

    /// Base trust fed into the composite scorer, per provider.
    pub fn base_trust(&self) -> u8 {
        match self {
            Provider::Releases => 62,
            Provider::Video => 58,
            Provider::Social => 45,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryCandidate {
    pub provider: Provider,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published_at: DateTime<Utc>,
    pub raw_categories: Vec<String>,
}

/// The standard provider set, wired from configuration.
pub fn default_set(cfg: &AppConfig) -> anyhow::Result<Vec<Box<dyn DiscoveryProvider>>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(cfg.request_timeout_ms))
        .build()?;
    Ok(vec![
        Box::new(releases::ReleaseFeedProvider::new(HttpFeedFetcher::new(
            cfg.request_timeout_ms,
        )?)),
        Box::new(video::VideoSearchProvider::new(
            client.clone(),
            cfg.discovery.video_api_base.clone(),
            cfg.discovery.video_api_key.clone(),
        )),
        Box::new(social::SocialTimelineProvider::new(
            client,
            cfg.discovery.social_api_base.clone(),
        )),
    ])
}

#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    fn provider(&self) -> Provider;
    /// Gather quality-filtered candidates for one section. A provider with
    /// nothing to offer (no config, no credentials) returns an empty list,
    /// not an error.
    async fn gather(
        &self,
        section: Section,
        policy: &DiscoveryPolicy,
    ) -> anyhow::Result<Vec<DiscoveryCandidate>>;
}
