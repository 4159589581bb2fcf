//! # Label Normalization
//! Pure, versioned mapping from free-text section labels and raw feed
//! categories to canonical codes. Used only at the ingestion boundary so
//! historical label spellings keep resolving; core admission logic never
//! sees raw labels.

use crate::model::Section;

/// Mapping revision. Bump when the alias table changes so stored rows can be
/// re-read against the revision that produced them.
pub const LABEL_MAP_VERSION: u32 = 2;

/// Resolve a free-text section label to a canonical section.
///
/// Fallback order: canonical name, then legacy aliases, then `None`.
pub fn normalize_section_label(raw: &str) -> Option<Section> {
    let s = normalize(raw);
    if let Ok(sec) = s.parse::<Section>() {
        return Some(sec);
    }
    match s.as_str() {
        // v1 labels, kept for backward-compatible reads
        "world" | "international" | "top" | "front page" => Some(Section::Global),
        "economy" | "markets" | "finance" | "biz" => Some(Section::Business),
        "technology" | "it" | "digital" => Some(Section::Tech),
        "sci" | "research" | "space" => Some(Section::Science),
        "arts" | "entertainment" | "lifestyle" => Some(Section::Culture),
        "sports" | "football" | "olympics" => Some(Section::Sport),
        // v2 additions
        "archive" | "retrospective" | "on this day" => Some(Section::History),
        _ => None,
    }
}

/// Map raw feed categories to at most two canonical topic codes, preserving
/// feed order and dropping repeats.
pub fn canonical_topics(raw_categories: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(2);
    for raw in raw_categories {
        if out.len() == 2 {
            break;
        }
        if let Some(code) = topic_code(raw) {
            if !out.iter().any(|t| t == &code) {
                out.push(code);
            }
        }
    }
    out
}

fn topic_code(raw: &str) -> Option<String> {
    let s = normalize(raw);
    if s.is_empty() || s.len() > 48 {
        return None;
    }
    let code = match s.as_str() {
        "ai" | "artificial intelligence" | "machine learning" => "ai",
        "climate" | "climate change" | "environment" => "climate",
        "elections" | "politics" | "government" => "politics",
        "economy" | "markets" | "finance" | "stocks" => "markets",
        "energy" | "oil" | "gas" => "energy",
        "health" | "medicine" | "covid" => "health",
        "security" | "cybersecurity" | "privacy" => "security",
        "science" | "space" | "research" => "science",
        "software" | "programming" | "open source" => "software",
        other => other,
    };
    Some(code.to_string())
}

/// Lowercase, replace separators and punctuation with spaces, collapse runs.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', ':', '&', '\''], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
