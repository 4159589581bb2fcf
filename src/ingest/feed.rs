//! # Feed Parser
//! Raw feed bytes + declared content type → normalized candidate entries.
//! Handles RSS 2.0 and Atom; a feed that parses as neither is a
//! [`ParseError`] and the caller skips the source for the rest of the run.

use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Snippet length cap, in characters.
pub const SNIPPET_MAX_CHARS: usize = 480;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed is not valid utf-8")]
    Encoding,
    #[error("malformed feed: {0}")]
    Syntax(String),
}

/// One normalized feed entry, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published_at: DateTime<Utc>,
    pub raw_categories: Vec<String>,
}

/* ----------------------------
RSS 2.0 schema
---------------------------- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<TextNode>,
}

/* ----------------------------
Atom schema
---------------------------- */

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    published: Option<String>,
    updated: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

/// Element whose text we want regardless of attributes (`type=`, `domain=`).
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Parse a fetched feed body. `now` backs entries with missing or
/// unparseable dates.
pub fn parse(
    bytes: &[u8],
    content_type: &str,
    now: DateTime<Utc>,
) -> Result<Vec<FeedEntry>, ParseError> {
    let t0 = std::time::Instant::now();
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding)?;
    let xml = scrub_html_entities_for_xml(text);

    let atom_first = content_type.contains("atom") || xml.contains("<feed");
    let entries = if atom_first {
        parse_atom(&xml, now).or_else(|_| parse_rss(&xml, now))
    } else {
        parse_rss(&xml, now).or_else(|_| parse_atom(&xml, now))
    }?;

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

fn parse_rss(xml: &str, now: DateTime<Utc>) -> Result<Vec<FeedEntry>, ParseError> {
    let rss: Rss = from_str(xml).map_err(|e| ParseError::Syntax(e.to_string()))?;
    let mut out = Vec::with_capacity(rss.channel.items.len());
    for it in rss.channel.items {
        let title = clean_text(it.title.as_deref().unwrap_or_default(), usize::MAX);
        let url = it.link.map(|l| l.trim().to_string()).unwrap_or_default();
        if title.is_empty() || url.is_empty() {
            continue;
        }
        out.push(FeedEntry {
            title,
            url,
            snippet: clean_text(it.description.as_deref().unwrap_or_default(), SNIPPET_MAX_CHARS),
            published_at: it
                .pub_date
                .as_deref()
                .and_then(parse_date)
                .unwrap_or(now),
            raw_categories: it
                .categories
                .into_iter()
                .filter_map(|c| c.value)
                .collect(),
        });
    }
    Ok(out)
}

fn parse_atom(xml: &str, now: DateTime<Utc>) -> Result<Vec<FeedEntry>, ParseError> {
    let feed: AtomFeed = from_str(xml).map_err(|e| ParseError::Syntax(e.to_string()))?;
    let mut out = Vec::with_capacity(feed.entries.len());
    for e in feed.entries {
        let title = clean_text(
            e.title.and_then(|t| t.value).as_deref().unwrap_or_default(),
            usize::MAX,
        );
        let url = pick_atom_link(&e.links);
        if title.is_empty() || url.is_empty() {
            continue;
        }
        let body = e
            .summary
            .and_then(|t| t.value)
            .or_else(|| e.content.and_then(|t| t.value))
            .unwrap_or_default();
        out.push(FeedEntry {
            title,
            url,
            snippet: clean_text(&body, SNIPPET_MAX_CHARS),
            published_at: e
                .published
                .as_deref()
                .or(e.updated.as_deref())
                .and_then(parse_date)
                .unwrap_or(now),
            raw_categories: e.categories.into_iter().filter_map(|c| c.term).collect(),
        });
    }
    Ok(out)
}

/// Prefer `rel="alternate"` (or no rel), fall back to the first link.
fn pick_atom_link(links: &[AtomLink]) -> String {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.href.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// RFC2822 (RSS) first, then RFC3339 (Atom). The chrono fallback picks up
/// the obsolete zone names (`GMT`, `UT`) feeds still emit.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc2822) {
        return DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decode entities, strip tags, collapse whitespace, cap length.
pub(crate) fn clean_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// quick-xml rejects HTML entities that XML never declared; flatten the
/// common ones before deserializing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
