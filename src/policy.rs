//! # Section Policy Table
//!
//! Per-section configuration consumed by the scorer and admission logic:
//! caps, retention, recency half-life, trust floor, keyword boosts, plus the
//! per-section fallback query and discovery settings.
//!
//! - Loads from TOML (`config/sections.toml` by default).
//! - File entries overlay a built-in `default_seed()`, so a partial file is
//!   fine and a missing/broken file still yields a complete table.
//! - Pure configuration, no behavior.

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

use crate::labels::normalize_section_label;
use crate::model::Section;

/// Additive score bonus for a keyword found in `title + snippet`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordBoost {
    pub keyword: String,
    pub bonus: f32,
}

/// Discovery-path settings carried on the section entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryPolicy {
    #[serde(default)]
    pub video_query: Option<String>,
    #[serde(default)]
    pub social_tag: Option<String>,
    #[serde(default)]
    pub release_feeds: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectionPolicy {
    pub per_run_cap: u32,
    pub daily_cap: u32,
    pub weekly_cap: u32,
    pub monthly_cap: u32,
    pub retention_days: u32,
    pub half_life_hours: f32,
    pub min_trust: u8,
    pub keyword_boosts: Vec<KeywordBoost>,
    pub fallback_query: Option<String>,
    pub discovery: Option<DiscoveryPolicy>,
}

impl Default for SectionPolicy {
    fn default() -> Self {
        Self {
            per_run_cap: 1,
            daily_cap: 5,
            weekly_cap: 25,
            monthly_cap: 90,
            retention_days: 30,
            half_life_hours: 24.0,
            min_trust: 50,
            keyword_boosts: Vec::new(),
            fallback_query: None,
            discovery: None,
        }
    }
}

/// The full table, one entry per known section.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: HashMap<Section, SectionPolicy>,
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    sections: HashMap<String, SectionPolicy>,
}

impl PolicyTable {
    pub fn get(&self, section: Section) -> &SectionPolicy {
        self.entries
            .get(&section)
            .expect("policy table seeded for all sections")
    }

    /// Load from a TOML file, overlaying the built-in seed.
    /// Falls back to `default_seed()` when the file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "section policy file rejected, using seed");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let file: PolicyFile = toml::from_str(s)?;
        let mut table = Self::default_seed();
        for (label, policy) in file.sections {
            match normalize_section_label(&label) {
                Some(section) => {
                    table.entries.insert(section, policy);
                }
                None => tracing::warn!(label = %label, "unknown section label in policy file"),
            }
        }
        Ok(table)
    }

    /// Built-in table used when no config file is present.
    pub fn default_seed() -> Self {
        let mut entries = HashMap::new();

        let boosts = |pairs: &[(&str, f32)]| -> Vec<KeywordBoost> {
            pairs
                .iter()
                .map(|(k, b)| KeywordBoost {
                    keyword: (*k).to_string(),
                    bonus: *b,
                })
                .collect()
        };

        entries.insert(
            Section::Global,
            SectionPolicy {
                daily_cap: 8,
                weekly_cap: 40,
                monthly_cap: 150,
                retention_days: 30,
                half_life_hours: 18.0,
                min_trust: 55,
                keyword_boosts: boosts(&[("exclusive", 0.06), ("investigation", 0.05)]),
                fallback_query: Some("world news".into()),
                ..Default::default()
            },
        );
        entries.insert(
            Section::Business,
            SectionPolicy {
                daily_cap: 6,
                weekly_cap: 30,
                monthly_cap: 110,
                retention_days: 30,
                half_life_hours: 24.0,
                min_trust: 55,
                keyword_boosts: boosts(&[("earnings", 0.05), ("merger", 0.05), ("antitrust", 0.04)]),
                fallback_query: Some("business economy".into()),
                ..Default::default()
            },
        );
        entries.insert(
            Section::Tech,
            SectionPolicy {
                daily_cap: 6,
                weekly_cap: 30,
                monthly_cap: 110,
                retention_days: 45,
                half_life_hours: 36.0,
                min_trust: 50,
                keyword_boosts: boosts(&[("open source", 0.06), ("benchmark", 0.04), ("security", 0.04)]),
                fallback_query: Some("technology".into()),
                discovery: Some(DiscoveryPolicy {
                    video_query: Some("technology deep dive".into()),
                    social_tag: Some("tech".into()),
                    release_feeds: vec![
                        "https://github.com/rust-lang/rust/releases.atom".into(),
                        "https://github.com/torvalds/linux/releases.atom".into(),
                    ],
                }),
                ..Default::default()
            },
        );
        entries.insert(
            Section::Science,
            SectionPolicy {
                daily_cap: 4,
                weekly_cap: 20,
                monthly_cap: 75,
                retention_days: 60,
                half_life_hours: 72.0,
                min_trust: 50,
                keyword_boosts: boosts(&[("peer reviewed", 0.06), ("dataset", 0.04)]),
                fallback_query: Some("science research".into()),
                discovery: Some(DiscoveryPolicy {
                    video_query: Some("science explained".into()),
                    social_tag: Some("science".into()),
                    release_feeds: Vec::new(),
                }),
                ..Default::default()
            },
        );
        entries.insert(
            Section::Culture,
            SectionPolicy {
                daily_cap: 4,
                weekly_cap: 20,
                monthly_cap: 75,
                retention_days: 45,
                half_life_hours: 72.0,
                min_trust: 45,
                keyword_boosts: boosts(&[("premiere", 0.04), ("review", 0.03)]),
                fallback_query: Some("culture arts".into()),
                discovery: Some(DiscoveryPolicy {
                    video_query: Some("documentary".into()),
                    social_tag: Some("culture".into()),
                    release_feeds: Vec::new(),
                }),
                ..Default::default()
            },
        );
        entries.insert(
            Section::Sport,
            SectionPolicy {
                daily_cap: 5,
                weekly_cap: 25,
                monthly_cap: 90,
                retention_days: 21,
                half_life_hours: 12.0,
                min_trust: 45,
                keyword_boosts: boosts(&[("final", 0.05), ("record", 0.04)]),
                fallback_query: Some("sport results".into()),
                ..Default::default()
            },
        );
        entries.insert(
            Section::History,
            SectionPolicy {
                daily_cap: 2,
                weekly_cap: 10,
                monthly_cap: 35,
                retention_days: 365,
                half_life_hours: 720.0,
                min_trust: 40,
                keyword_boosts: boosts(&[("anniversary", 0.05), ("archive", 0.04)]),
                fallback_query: Some("history archive".into()),
                ..Default::default()
            },
        );

        Self { entries }
    }
}
