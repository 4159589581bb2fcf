//! # Runtime Configuration
//! One typed [`AppConfig`] loaded from the environment exactly once at
//! startup and passed explicitly to each component. Components never read
//! env vars themselves.

use crate::scoring::ScoreWeights;

const DEFAULT_TIME_BUDGET_MS: u64 = 55_000;
const MIN_TIME_BUDGET_MS: u64 = 10_000;
const MAX_TIME_BUDGET_MS: u64 = 280_000;

/// Everything tunable from outside. See `.env.example` for the variable list;
/// every knob has a default that works without any environment at all.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Wall-clock budget for one ingest run, clamped to a sane range.
    pub time_budget_ms: u64,
    pub max_sources_per_run: usize,
    pub fetch_concurrency: usize,
    pub request_timeout_ms: u64,
    /// Hours during which an admitted URL cannot be re-admitted to the
    /// same section.
    pub no_repeat_hours: i64,
    /// Hours during which a source that recently won is soft-penalized.
    pub cooldown_hours: i64,
    /// Off by default: disable a source once `consecutive_fails` crosses
    /// `disable_after_fails`.
    pub auto_disable: bool,
    pub disable_after_fails: u32,
    /// Quarantine before the maintenance sweep re-enables an
    /// auto-disabled source.
    pub reenable_after_hours: i64,
    /// Global retention horizon in days, independent of section.
    pub retention_horizon_days: i64,
    pub weights: ScoreWeights,
    pub discovery: DiscoveryConfig,
    pub policy_path: String,
    pub sources_path: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Minimum hours between discovery runs for one section.
    pub interval_hours: i64,
    /// Total admissions per section per discovery run.
    pub per_run_cap: u32,
    pub daily_cap: u32,
    pub weekly_cap: u32,
    pub retention_days: i64,
    pub video_api_key: Option<String>,
    pub video_api_base: String,
    pub social_api_base: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_hours: 12,
            per_run_cap: 3,
            daily_cap: 3,
            weekly_cap: 10,
            retention_days: 7,
            video_api_key: None,
            video_api_base: "https://www.googleapis.com/youtube/v3".into(),
            social_api_base: "https://mastodon.social".into(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            time_budget_ms: DEFAULT_TIME_BUDGET_MS,
            max_sources_per_run: 60,
            fetch_concurrency: 8,
            request_timeout_ms: 10_000,
            no_repeat_hours: 12,
            cooldown_hours: 6,
            auto_disable: false,
            disable_after_fails: 25,
            reenable_after_hours: 72,
            retention_horizon_days: 90,
            weights: ScoreWeights::default(),
            discovery: DiscoveryConfig::default(),
            policy_path: "config/sections.toml".into(),
            sources_path: "config/sources.toml".into(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Read the full configuration from `NEWSDESK_*` environment variables.
    /// Call once at startup, after `dotenvy`.
    pub fn from_env() -> Self {
        let d = Self::default();
        let mut cfg = Self {
            time_budget_ms: env_u64("NEWSDESK_TIME_BUDGET_MS", d.time_budget_ms)
                .clamp(MIN_TIME_BUDGET_MS, MAX_TIME_BUDGET_MS),
            max_sources_per_run: env_u64("NEWSDESK_MAX_SOURCES", d.max_sources_per_run as u64)
                .clamp(1, 500) as usize,
            fetch_concurrency: env_u64("NEWSDESK_FETCH_CONCURRENCY", d.fetch_concurrency as u64)
                .clamp(1, 32) as usize,
            request_timeout_ms: env_u64("NEWSDESK_REQUEST_TIMEOUT_MS", d.request_timeout_ms),
            no_repeat_hours: env_i64("NEWSDESK_NO_REPEAT_HOURS", d.no_repeat_hours),
            cooldown_hours: env_i64("NEWSDESK_COOLDOWN_HOURS", d.cooldown_hours),
            auto_disable: env_bool("NEWSDESK_AUTO_DISABLE", d.auto_disable),
            disable_after_fails: env_u64("NEWSDESK_DISABLE_AFTER_FAILS", d.disable_after_fails as u64)
                as u32,
            reenable_after_hours: env_i64("NEWSDESK_REENABLE_AFTER_HOURS", d.reenable_after_hours),
            retention_horizon_days: env_i64(
                "NEWSDESK_RETENTION_HORIZON_DAYS",
                d.retention_horizon_days,
            ),
            weights: ScoreWeights {
                w_trust: env_f32("NEWSDESK_W_TRUST", d.weights.w_trust),
                w_recency: env_f32("NEWSDESK_W_RECENCY", d.weights.w_recency),
                w_quality: env_f32("NEWSDESK_W_QUALITY", d.weights.w_quality),
                w_keyword: env_f32("NEWSDESK_W_KEYWORD", d.weights.w_keyword),
            },
            discovery: DiscoveryConfig {
                interval_hours: env_i64(
                    "NEWSDESK_DISCOVERY_INTERVAL_HOURS",
                    d.discovery.interval_hours,
                ),
                per_run_cap: env_u64("NEWSDESK_DISCOVERY_PER_RUN", d.discovery.per_run_cap as u64)
                    as u32,
                daily_cap: env_u64("NEWSDESK_DISCOVERY_DAILY_CAP", d.discovery.daily_cap as u64)
                    as u32,
                weekly_cap: env_u64("NEWSDESK_DISCOVERY_WEEKLY_CAP", d.discovery.weekly_cap as u64)
                    as u32,
                retention_days: env_i64(
                    "NEWSDESK_DISCOVERY_RETENTION_DAYS",
                    d.discovery.retention_days,
                ),
                video_api_key: std::env::var("NEWSDESK_VIDEO_API_KEY").ok(),
                video_api_base: env_string("NEWSDESK_VIDEO_API_BASE", &d.discovery.video_api_base),
                social_api_base: env_string(
                    "NEWSDESK_SOCIAL_API_BASE",
                    &d.discovery.social_api_base,
                ),
            },
            policy_path: env_string("NEWSDESK_POLICY_PATH", &d.policy_path),
            sources_path: env_string("NEWSDESK_SOURCES_PATH", &d.sources_path),
            port: env_u64("PORT", d.port as u64) as u16,
        };
        // A run budget shorter than its own safety margin can never fetch.
        if cfg.time_budget_ms <= cfg.safety_margin_ms() {
            cfg.time_budget_ms = MIN_TIME_BUDGET_MS;
        }
        cfg
    }

    /// Deadline safety margin. Small total budgets get a proportionally
    /// larger margin ("fast mode") so the run always finishes inside its
    /// caller's hard stop.
    pub fn safety_margin_ms(&self) -> u64 {
        if self.time_budget_ms < 30_000 {
            10_000.min(self.time_budget_ms / 2)
        } else {
            8_000
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
