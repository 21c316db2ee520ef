use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_dns_domain::Rcode;

/// Process-wide counters. All increments are relaxed atomics; readers see
/// eventually-consistent snapshots, which is all the observability
/// surface promises.
#[derive(Default)]
pub struct ServerMetrics {
    queries_total: AtomicU64,
    responses_by_rcode: DashMap<Rcode, u64, FxBuildHasher>,
    upstream_failures: AtomicU64,
    cache_hits: AtomicU64,
    coalescer_dedup_hits: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, rcode: Rcode) {
        self.responses_by_rcode
            .entry(rcode)
            .and_modify(|c| *c += 1)
            .or_insert(1);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup_hit(&self) {
        self.coalescer_dedup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queries_total(&self) -> u64 {
        self.queries_total.load(Ordering::Relaxed)
    }

    pub fn responses_for(&self, rcode: Rcode) -> u64 {
        self.responses_by_rcode.get(&rcode).map(|v| *v).unwrap_or(0)
    }

    pub fn upstream_failures(&self) -> u64 {
        self.upstream_failures.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn coalescer_dedup_hits(&self) -> u64 {
        self.coalescer_dedup_hits.load(Ordering::Relaxed)
    }
}
