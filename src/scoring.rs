//! # Candidate Scorer
//! Composite `[0,1]` score from trust, recency, lexical quality, and keyword
//! boosts, with a soft diversity penalty for sources that won recently.
//!
//! `score = clamp(wt*trust + wr*recency + wq*quality + wk*clamp(kw, 0, 0.25), 0, 1)`
//!
//! The four-term form is canonical here; weights are carried in
//! [`ScoreWeights`] so callers can recalibrate without touching call sites.

use crate::policy::{KeywordBoost, SectionPolicy};

/// Ceiling for the summed keyword bonus before weighting.
pub const KEYWORD_BOOST_CEILING: f32 = 0.25;

/// Multiplier applied when the candidate's source won this section within
/// the cooldown window. Soft, not exclusionary.
pub const COOLDOWN_PENALTY: f32 = 0.92;

const QUALITY_MARKER_PENALTY: f32 = 0.4;

/// Markers of syndicated or promotional filler.
const LOW_QUALITY_MARKERS: [&str; 6] = [
    "sponsored",
    "press release",
    "podcast",
    "newsletter",
    "webinar",
    "giveaway",
];

/// Calibrated component weights. Defaults are the canonical four-term set.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub w_trust: f32,
    pub w_recency: f32,
    pub w_quality: f32,
    pub w_keyword: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            w_trust: 0.33,
            w_recency: 0.42,
            w_quality: 0.18,
            w_keyword: 0.07,
        }
    }
}

/// Per-candidate signals. Text is borrowed; the scorer never allocates.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    /// Operator trust for the owning source, 0..=100.
    pub trust_score: u8,
    /// Hours since publication. Negative (future-dated) ages count as 0.
    pub age_hours: f32,
    pub title: &'a str,
    pub snippet: &'a str,
    /// True when the owning source is in the section's recent-winner set.
    pub source_on_cooldown: bool,
}

pub fn score(input: &ScoreInput<'_>, policy: &SectionPolicy, w: &ScoreWeights) -> f32 {
    let trust = (input.trust_score as f32 / 100.0).clamp(0.0, 1.0);
    let rec = recency(input.age_hours, policy.half_life_hours);
    let q = quality(input.title, input.snippet);
    let kw = keyword_boost(input.title, input.snippet, &policy.keyword_boosts)
        .clamp(0.0, KEYWORD_BOOST_CEILING);

    let mut s = (w.w_trust * trust + w.w_recency * rec + w.w_quality * q + w.w_keyword * kw)
        .clamp(0.0, 1.0);
    if input.source_on_cooldown {
        s *= COOLDOWN_PENALTY;
    }
    s
}

/// Exponential freshness decay: 1.0 at age 0, 0.5 at one half-life,
/// monotonically decreasing.
pub fn recency(age_hours: f32, half_life_hours: f32) -> f32 {
    let age = age_hours.max(0.0);
    let hl = half_life_hours.max(0.01);
    0.5f32.powf(age / hl)
}

/// Length-normalized text quality with a flat penalty for filler markers.
pub fn quality(title: &str, snippet: &str) -> f32 {
    let title_part = (title.chars().count() as f32 / 70.0).min(1.0);
    let snippet_part = (snippet.chars().count() as f32 / 280.0).min(1.0);
    let mut q = (0.55 * title_part + 0.45 * snippet_part).clamp(0.0, 1.0);

    let haystack = format!("{} {}", title, snippet).to_lowercase();
    if LOW_QUALITY_MARKERS.iter().any(|m| haystack.contains(m)) {
        q -= QUALITY_MARKER_PENALTY;
    }
    q.clamp(0.0, 1.0)
}

/// Sum of per-keyword bonuses for keywords present in `title + snippet`
/// (case-insensitive substring match). Uncapped here; the caller clamps.
pub fn keyword_boost(title: &str, snippet: &str, boosts: &[KeywordBoost]) -> f32 {
    if boosts.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {}", title, snippet).to_lowercase();
    boosts
        .iter()
        .filter(|b| haystack.contains(&b.keyword.to_lowercase()))
        .map(|b| b.bonus)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;
    use crate::model::Section;

    #[test]
    fn recency_anchors_and_monotonicity() {
        assert!((recency(0.0, 24.0) - 1.0).abs() < 1e-6);
        assert!((recency(24.0, 24.0) - 0.5).abs() < 1e-6);
        let mut prev = recency(0.0, 24.0);
        for h in 1..96 {
            let r = recency(h as f32, 24.0);
            assert!(r < prev, "recency must strictly decrease");
            prev = r;
        }
    }

    #[test]
    fn future_dated_items_score_as_fresh() {
        assert!((recency(-3.0, 24.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quality_penalizes_filler_markers() {
        let clean = quality("Central bank raises rates by 50 basis points", "A long enough snippet describing the decision and its immediate market impact in plain language.");
        let spon = quality("Sponsored: central bank raises rates", "A long enough snippet describing the decision and its immediate market impact in plain language.");
        assert!(clean > spon);
        assert!(spon >= 0.0);
    }

    #[test]
    fn keyword_boost_sums_and_caps_at_ceiling() {
        let table = PolicyTable::default_seed();
        let policy = table.get(Section::Business);
        let b = keyword_boost(
            "Earnings beat expectations after merger closes",
            "Antitrust clearance arrived last week",
            &policy.keyword_boosts,
        );
        assert!(b > 0.0);
        assert!(b.clamp(0.0, KEYWORD_BOOST_CEILING) <= KEYWORD_BOOST_CEILING);
    }

    #[test]
    fn cooldown_applies_soft_penalty() {
        let table = PolicyTable::default_seed();
        let policy = table.get(Section::Global);
        let w = ScoreWeights::default();
        let base = ScoreInput {
            trust_score: 80,
            age_hours: 1.0,
            title: "A reasonably descriptive headline about events",
            snippet: "Enough body text to register as substantive coverage.",
            source_on_cooldown: false,
        };
        let cooled = ScoreInput {
            source_on_cooldown: true,
            ..base
        };
        let s0 = score(&base, policy, &w);
        let s1 = score(&cooled, policy, &w);
        assert!((s1 / s0 - COOLDOWN_PENALTY).abs() < 1e-4);
        assert!(s1 > 0.0, "cooldown must not exclude");
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let table = PolicyTable::default_seed();
        let policy = table.get(Section::Global);
        let w = ScoreWeights::default();
        let s = score(
            &ScoreInput {
                trust_score: 100,
                age_hours: 0.0,
                title: "Exclusive investigation into a very long and detailed headline that keeps going",
                snippet: &"x".repeat(500),
                source_on_cooldown: false,
            },
            policy,
            &w,
        );
        assert!((0.0..=1.0).contains(&s));
    }
}
