//! Short-form social tag timeline (Mastodon-compatible JSON). The noisiest
//! provider, so the gate is engagement plus a negative-keyword list, and
//! the post text doubles as both title and snippet.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::feed;
use crate::model::Section;
use crate::policy::DiscoveryPolicy;

use super::{DiscoveryCandidate, DiscoveryProvider, Provider};

const MIN_ENGAGEMENT: u64 = 5;
const TIMELINE_PAGE_SIZE: u32 = 40;
const TITLE_MAX_CHARS: usize = 90;

const NEGATIVE_KEYWORDS: [&str; 5] = ["giveaway", "follow me", "nsfw", "promo code", "airdrop"];

pub struct SocialTimelineProvider {
    client: reqwest::Client,
    api_base: String,
}

impl SocialTimelineProvider {
    pub fn new(client: reqwest::Client, api_base: String) -> Self {
        Self { client, api_base }
    }
}

#[derive(Debug, Deserialize)]
struct Status {
    url: Option<String>,
    #[serde(default)]
    content: String,
    created_at: String,
    #[serde(default)]
    favourites_count: u64,
    #[serde(default)]
    reblogs_count: u64,
    #[serde(default)]
    tags: Vec<StatusTag>,
}

#[derive(Debug, Deserialize)]
struct StatusTag {
    name: String,
}

/// Parse one timeline page and apply the quality gate.
pub fn parse_timeline(json: &str, now: DateTime<Utc>) -> anyhow::Result<Vec<DiscoveryCandidate>> {
    let statuses: Vec<Status> = serde_json::from_str(json).context("timeline response")?;
    let mut out = Vec::new();
    for status in statuses {
        let Some(url) = status.url else { continue };
        let text = feed::clean_text(&status.content, feed::SNIPPET_MAX_CHARS);
        if text.is_empty() {
            continue;
        }
        let lowered = text.to_lowercase();
        if NEGATIVE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            continue;
        }
        if status.favourites_count + status.reblogs_count < MIN_ENGAGEMENT {
            continue;
        }
        out.push(DiscoveryCandidate {
            provider: Provider::Social,
            title: title_from_text(&text),
            url,
            snippet: text,
            published_at: DateTime::parse_from_rfc3339(&status.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now),
            raw_categories: status.tags.into_iter().map(|t| t.name).collect(),
        });
    }
    Ok(out)
}

/// First sentence, capped; posts have no headline of their own.
fn title_from_text(text: &str) -> String {
    let sentence = text
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(text)
        .trim_end_matches(['.', '!', '?'])
        .trim();
    if sentence.chars().count() <= TITLE_MAX_CHARS {
        return sentence.to_string();
    }
    let cut: String = sentence.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[async_trait]
impl DiscoveryProvider for SocialTimelineProvider {
    fn provider(&self) -> Provider {
        Provider::Social
    }

    async fn gather(
        &self,
        _section: Section,
        policy: &DiscoveryPolicy,
    ) -> anyhow::Result<Vec<DiscoveryCandidate>> {
        let Some(tag) = policy.social_tag.as_deref() else {
            return Ok(Vec::new());
        };
        let url = format!(
            "{}/api/v1/timelines/tag/{}?limit={}",
            self.api_base, tag, TIMELINE_PAGE_SIZE
        );
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .context("timeline request")?
            .error_for_status()
            .context("timeline status")?
            .text()
            .await
            .context("timeline body")?;
        parse_timeline(&body, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_json(favs: u64, boosts: u64, content: &str) -> String {
        format!(
            r#"[{{"url":"https://social.example/@a/1","content":"{content}",
                "created_at":"2025-06-01T12:00:00Z",
                "favourites_count":{favs},"reblogs_count":{boosts},
                "tags":[{{"name":"tech"}},{{"name":"ai"}}]}}]"#
        )
    }

    #[test]
    fn engaged_posts_pass_with_stripped_text() {
        let json = status_json(4, 2, "<p>Shipping a new parser today. Details in thread.</p>");
        let out = parse_timeline(&json, Utc::now()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Shipping a new parser today");
        assert_eq!(out[0].raw_categories, vec!["tech", "ai"]);
    }

    #[test]
    fn low_engagement_posts_are_dropped() {
        let json = status_json(1, 1, "<p>Interesting enough, but nobody cared.</p>");
        assert!(parse_timeline(&json, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn negative_keywords_drop_posts() {
        let json = status_json(50, 50, "<p>Huge GIVEAWAY, boost to enter!</p>");
        assert!(parse_timeline(&json, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn long_first_sentences_get_ellipsized() {
        let long = "word ".repeat(40);
        let t = title_from_text(&long);
        assert!(t.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(t.ends_with('…'));
    }
}
