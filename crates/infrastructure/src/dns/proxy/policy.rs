use super::host::UpstreamHost;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_dns_domain::SelectionPolicy;

/// Host selection over the healthy subset of a pool.
pub enum Policy {
    Random,
    RoundRobin(AtomicUsize),
    LeastConn,
}

impl Policy {
    pub fn from_config(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::Random => Policy::Random,
            SelectionPolicy::RoundRobin => Policy::RoundRobin(AtomicUsize::new(0)),
            SelectionPolicy::LeastConn => Policy::LeastConn,
        }
    }

    /// Pick among hosts that are currently up; `None` when every host is
    /// down.
    pub fn select(&self, hosts: &[Arc<UpstreamHost>]) -> Option<Arc<UpstreamHost>> {
        let healthy: Vec<&Arc<UpstreamHost>> = hosts.iter().filter(|h| !h.is_down()).collect();
        if healthy.is_empty() {
            return None;
        }
        let chosen = match self {
            Policy::Random => healthy[fastrand::usize(..healthy.len())],
            Policy::RoundRobin(counter) => {
                let index = counter.fetch_add(1, Ordering::Relaxed) % healthy.len();
                healthy[index]
            }
            Policy::LeastConn => {
                return healthy
                    .iter()
                    .copied()
                    .min_by_key(|h| h.active_conns())
                    .map(Arc::clone)
            }
        };
        Some(Arc::clone(chosen))
    }
}
