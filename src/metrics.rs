//! Prometheus exporter plus the registry of every series the engine emits.
//! Orchestrators call [`ensure_described`] so descriptions exist before the
//! first sample lands, whether the process entered through the binary or an
//! integration test.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time registration of series metadata (so they show up on /metrics
/// with help text even before the first increment).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingest orchestrator invocations.");
        describe_counter!("ingest_sources_fetched_total", "Sources fetched successfully.");
        describe_counter!("ingest_fetch_errors_total", "Source fetch failures (HTTP/timeout).");
        describe_counter!("ingest_parse_errors_total", "Malformed feeds skipped.");
        describe_counter!("ingest_admitted_total", "Candidates admitted as items.");
        describe_counter!("ingest_fallback_queries_total", "Fallback pool queries issued.");
        describe_counter!("ingest_pruned_total", "Items removed by cap pruning.");
        describe_counter!("ingest_expired_total", "Items removed by the global retention sweep.");
        describe_counter!("discover_runs_total", "Discovery orchestrator invocations.");
        describe_counter!("discover_admitted_total", "Discovery candidates admitted.");
        describe_counter!("discover_provider_errors_total", "Discovery provider fetch/parse errors.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("source_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!("ingest_time_budget_ms", "Configured wall-clock budget per ingest run.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingest last ran.");
        describe_gauge!("discover_last_run_ts", "Unix ts when discovery last ran.");
    });
}

pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the static config gauges.
    /// Must run before the first orchestrator call records a sample.
    pub fn init(time_budget_ms: u64) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_described();
        gauge!("ingest_time_budget_ms").set(time_budget_ms as f64);
        Self { handle }
    }

    /// `/metrics` in Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    }
}
