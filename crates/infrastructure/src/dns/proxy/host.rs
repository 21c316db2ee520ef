use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// One upstream resolver endpoint with its health window.
///
/// Counters are lock-free; the mutex only serializes forced health
/// transitions from the external health prod, which are rare.
pub struct UpstreamHost {
    addr: SocketAddr,
    conns: AtomicI64,
    fails: AtomicU32,
    forced_down: AtomicBool,
    fail_timeout: Duration,
    max_fails: u32,
    transition_lock: Mutex<()>,
}

impl UpstreamHost {
    pub fn new(addr: SocketAddr, fail_timeout: Duration, max_fails: u32) -> Self {
        Self {
            addr,
            conns: AtomicI64::new(0),
            fails: AtomicU32::new(0),
            forced_down: AtomicBool::new(false),
            fail_timeout,
            max_fails,
            transition_lock: Mutex::new(()),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Unhealthy once `max_fails` failures accumulate inside the sliding
    /// window, or when an external prod forced the host down. A
    /// `max_fails` of zero disables failure-based eviction.
    pub fn is_down(&self) -> bool {
        if self.forced_down.load(Ordering::Relaxed) {
            return true;
        }
        self.max_fails != 0 && self.fails.load(Ordering::Relaxed) >= self.max_fails
    }

    pub fn fails(&self) -> u32 {
        self.fails.load(Ordering::Relaxed)
    }

    pub fn active_conns(&self) -> i64 {
        self.conns.load(Ordering::Relaxed)
    }

    pub fn conns_inc(&self) {
        self.conns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conns_dec(&self) {
        self.conns.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record one failure and schedule its matched decrement after
    /// `fail_timeout`, so the window empties by itself once failures stop.
    pub fn record_failure(self: &std::sync::Arc<Self>) {
        self.fails.fetch_add(1, Ordering::Relaxed);
        let host = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(host.fail_timeout).await;
            host.fails.fetch_sub(1, Ordering::Relaxed);
            debug!(server = %host.addr, fails = host.fails(), "Upstream failure expired");
        });
    }

    /// External health prod: force the host into or out of the selection
    /// set regardless of its failure window.
    pub fn set_forced_down(&self, down: bool) {
        let _guard = self.transition_lock.lock();
        self.forced_down.store(down, Ordering::Relaxed);
    }
}
