//! Suppression of duplicate in-flight backend fetches.
//!
//! The first caller for a fresh key becomes the leader; its future runs on
//! a detached task so a cancelled leader still completes the fetch and the
//! next arrival benefits. All concurrent callers for the key share one
//! `Arc`-wrapped result. The entry is removed the moment the future
//! resolves, so a later call re-executes.

use crate::dns::metrics::ServerMetrics;
use dashmap::DashMap;
use futures::FutureExt;
use rustc_hash::FxBuildHasher;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_dns_domain::DomainError;
use tokio::sync::watch;
use tracing::warn;

type Shared<T> = Result<Arc<T>, DomainError>;
type FlightSender<T> = Arc<watch::Sender<Option<Shared<T>>>>;

pub struct Group<T> {
    inflight: Arc<DashMap<String, FlightSender<T>, FxBuildHasher>>,
    dedup_hits: AtomicU64,
    metrics: Option<Arc<ServerMetrics>>,
}

impl<T: Send + Sync + 'static> Group<T> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::with_hasher(FxBuildHasher)),
            dedup_hits: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Calls suppressed because another caller already had the key in
    /// flight.
    pub fn dedup_hits(&self) -> u64 {
        self.dedup_hits.load(Ordering::Relaxed)
    }

    /// Execute `fut` at most once per `key` among concurrent callers; all
    /// of them observe the identical result. Dropping a waiter only
    /// abandons its wait, never the underlying fetch.
    pub async fn run<F>(&self, key: &str, fut: F) -> Result<Arc<T>, DomainError>
    where
        F: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let mut rx = match self.inflight.entry(key.to_string()) {
            dashmap::Entry::Occupied(entry) => {
                let rx = entry.get().subscribe();
                drop(entry);
                self.dedup_hits.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.metrics {
                    metrics.record_dedup_hit();
                }
                rx
            }
            dashmap::Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None::<Shared<T>>);
                let tx = Arc::new(tx);
                entry.insert(Arc::clone(&tx));

                let inflight = Arc::clone(&self.inflight);
                let key_owned = key.to_string();
                tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(fut).catch_unwind().await;
                    let shared: Shared<T> = match outcome {
                        Ok(Ok(value)) => Ok(Arc::new(value)),
                        Ok(Err(err)) => Err(err),
                        Err(_) => {
                            warn!(key = %key_owned, "Coalesced fetch panicked");
                            Err(DomainError::Transient(
                                "coalesced fetch panicked".to_string(),
                            ))
                        }
                    };
                    // Remove before broadcasting: a caller arriving after
                    // completion must start a fresh flight.
                    inflight.remove(&key_owned);
                    let _ = tx.send(Some(shared));
                });
                rx
            }
        };

        if rx.changed().await.is_ok() {
            if let Some(result) = rx.borrow().clone() {
                return result;
            }
        }
        // The sender may have broadcast before we subscribed; the value is
        // still readable.
        if let Some(result) = rx.borrow().clone() {
            return result;
        }
        Err(DomainError::Transient(
            "coalesced flight ended without a result".to_string(),
        ))
    }
}

impl<T: Send + Sync + 'static> Default for Group<T> {
    fn default() -> Self {
        Self::new()
    }
}
