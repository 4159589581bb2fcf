//! Video platform search + details. Two JSON calls (search for ids, then a
//! details batch), with the strictest quality gate of the three providers:
//! shorts, barely-watched uploads, and live broadcasts never make it out.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::feed;
use crate::model::Section;
use crate::policy::DiscoveryPolicy;

use super::{DiscoveryCandidate, DiscoveryProvider, Provider};

const MIN_DURATION_SECS: u64 = 180;
const MIN_VIEWS: u64 = 1_000;
const MIN_LIKES: u64 = 50;
const MIN_VIEWS_PER_DAY: f32 = 150.0;
const SEARCH_PAGE_SIZE: u32 = 25;

const NEGATIVE_KEYWORDS: [&str; 5] = ["#shorts", "giveaway", "sponsored", "leaked", "clickbait"];

pub struct VideoSearchProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl VideoSearchProvider {
    pub fn new(client: reqwest::Client, api_base: String, api_key: Option<String>) -> Self {
        Self {
            client,
            api_base,
            api_key,
        }
    }
}

/* ----------------------------
Wire schema (the fields we read)
---------------------------- */

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: VideoStats,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
    #[serde(rename = "liveBroadcastContent", default)]
    live_broadcast_content: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStats {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
}

/// Details the quality gate runs on.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub views: u64,
    pub likes: u64,
    pub live: bool,
    pub tags: Vec<String>,
}

pub fn parse_videos_response(json: &str, now: DateTime<Utc>) -> anyhow::Result<Vec<VideoInfo>> {
    let resp: VideosResponse = serde_json::from_str(json).context("videos response")?;
    Ok(resp
        .items
        .into_iter()
        .map(|item| VideoInfo {
            id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: DateTime::parse_from_rfc3339(&item.snippet.published_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now),
            duration_secs: parse_iso8601_duration(&item.content_details.duration),
            views: parse_count(item.statistics.view_count.as_deref()),
            likes: parse_count(item.statistics.like_count.as_deref()),
            live: !matches!(item.snippet.live_broadcast_content.as_str(), "" | "none"),
            tags: item.snippet.tags,
        })
        .collect())
}

fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// `PT1H2M3S` → 3723. Tolerates the `P#DT...` day form.
pub fn parse_iso8601_duration(raw: &str) -> u64 {
    let mut secs = 0u64;
    let mut num = String::new();
    let mut in_time = false;
    for c in raw.chars() {
        match c {
            'P' => {}
            'T' => in_time = true,
            '0'..='9' => num.push(c),
            'D' | 'H' | 'M' | 'S' => {
                let n: u64 = num.parse().unwrap_or(0);
                num.clear();
                secs += match (c, in_time) {
                    ('D', _) => n * 86_400,
                    ('H', _) => n * 3_600,
                    ('M', true) => n * 60,
                    ('M', false) => n * 2_592_000, // month form never really appears
                    ('S', _) => n,
                    _ => 0,
                };
            }
            _ => num.clear(),
        }
    }
    secs
}

/// Minimum duration, engagement floor (absolute views+likes, or
/// views-per-day for young uploads), negative keywords, no live broadcasts.
pub fn passes_quality(v: &VideoInfo, now: DateTime<Utc>) -> bool {
    if v.live || v.duration_secs < MIN_DURATION_SECS {
        return false;
    }
    let title = v.title.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|k| title.contains(k)) {
        return false;
    }
    let engaged = v.views >= MIN_VIEWS && v.likes >= MIN_LIKES;
    engaged || views_per_day(v.views, v.published_at, now) >= MIN_VIEWS_PER_DAY
}

fn views_per_day(views: u64, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age_days = ((now - published_at).num_minutes() as f32 / 1_440.0).max(0.25);
    views as f32 / age_days
}

#[async_trait]
impl DiscoveryProvider for VideoSearchProvider {
    fn provider(&self) -> Provider {
        Provider::Video
    }

    async fn gather(
        &self,
        _section: Section,
        policy: &DiscoveryPolicy,
    ) -> anyhow::Result<Vec<DiscoveryCandidate>> {
        let (Some(key), Some(query)) = (self.api_key.as_deref(), policy.video_query.as_deref())
        else {
            return Ok(Vec::new());
        };
        let now = Utc::now();

        let search_url = format!(
            "{}/search?part=snippet&type=video&maxResults={}&q={}&key={}",
            self.api_base,
            SEARCH_PAGE_SIZE,
            query.split_whitespace().collect::<Vec<_>>().join("+"),
            key
        );
        let search: SearchResponse = self
            .client
            .get(&search_url)
            .send()
            .await
            .context("video search request")?
            .error_for_status()
            .context("video search status")?
            .json()
            .await
            .context("video search body")?;

        let ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|i| i.id.video_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let details_url = format!(
            "{}/videos?part=snippet,contentDetails,statistics&id={}&key={}",
            self.api_base,
            ids.join(","),
            key
        );
        let body = self
            .client
            .get(&details_url)
            .send()
            .await
            .context("video details request")?
            .error_for_status()
            .context("video details status")?
            .text()
            .await
            .context("video details body")?;

        let out = parse_videos_response(&body, now)?
            .into_iter()
            .filter(|v| passes_quality(v, now))
            .map(|v| DiscoveryCandidate {
                provider: Provider::Video,
                url: format!("https://www.youtube.com/watch?v={}", v.id),
                snippet: feed::clean_text(&v.description, feed::SNIPPET_MAX_CHARS),
                title: v.title,
                published_at: v.published_at,
                raw_categories: v.tags,
            })
            .collect();
        Ok(out)
    }
}
