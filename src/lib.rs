// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod discover;
pub mod ingest;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod scoring;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::model::{DiscoverOutcome, IngestOutcome};
pub use crate::policy::PolicyTable;
pub use crate::store::{ContentStore, MemoryStore};

/// Short anonymized hash for URL-bearing log lines; raw URLs stay out of
/// log pipelines.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("https://example.org/feed");
        let b = anon_hash("https://example.org/feed");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, anon_hash("https://example.org/other"));
    }
}
