use crate::dns::chain::{ChainHandler, ServeOutcome};
use crate::dns::metrics::ServerMetrics;
use async_trait::async_trait;
use dashmap::DashMap;
use hickory_proto::op::{Message, ResponseCode};
use rustc_hash::FxBuildHasher;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_dns_domain::{DomainError, QueryContext, RecordType};
use tracing::debug;

/// Response cache in front of the rest of its chain. On a miss the inner
/// handlers run in their configured order; their answer is kept until the
/// smallest answer TTL expires.
pub struct CacheHandler {
    inner: Vec<Arc<dyn ChainHandler>>,
    entries: DashMap<(Arc<str>, RecordType), CachedAnswer, FxBuildHasher>,
    max_entries: usize,
    negative_ttl: Duration,
    metrics: Option<Arc<ServerMetrics>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheOptions {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Lifetime for cached NXDOMAIN/NODATA answers.
    #[serde(default = "default_negative_ttl_secs")]
    pub negative_ttl_secs: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            negative_ttl_secs: default_negative_ttl_secs(),
        }
    }
}

fn default_max_entries() -> usize {
    10_000
}

fn default_negative_ttl_secs() -> u64 {
    30
}

struct CachedAnswer {
    message: Message,
    stored: Instant,
    ttl: Duration,
}

impl CacheHandler {
    pub fn from_options(
        options: &toml::Value,
        inner: Vec<Arc<dyn ChainHandler>>,
    ) -> Result<Self, DomainError> {
        let options: CacheOptions = options
            .clone()
            .try_into()
            .map_err(|e| DomainError::ConfigError(format!("cache handler options: {}", e)))?;
        Ok(Self::new(options, inner))
    }

    pub fn new(options: CacheOptions, inner: Vec<Arc<dyn ChainHandler>>) -> Self {
        Self {
            inner,
            entries: DashMap::with_hasher(FxBuildHasher),
            max_entries: options.max_entries,
            negative_ttl: Duration::from_secs(options.negative_ttl_secs),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn lookup(&self, key: &(Arc<str>, RecordType), request_id: u16) -> Option<Message> {
        let entry = self.entries.get(key)?;
        if entry.stored.elapsed() >= entry.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        let mut message = entry.message.clone();
        message.set_id(request_id);
        Some(message)
    }

    fn store(&self, key: (Arc<str>, RecordType), message: &Message) {
        let cacheable = matches!(
            message.response_code(),
            ResponseCode::NoError | ResponseCode::NXDomain
        );
        if !cacheable {
            return;
        }
        let ttl = message
            .answers()
            .iter()
            .map(|r| Duration::from_secs(u64::from(r.ttl())))
            .min()
            .unwrap_or(self.negative_ttl);
        if ttl.is_zero() {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.entries
                .retain(|_, entry| entry.stored.elapsed() < entry.ttl);
            if self.entries.len() >= self.max_entries {
                debug!("Response cache full, skipping insert");
                return;
            }
        }
        self.entries.insert(
            key,
            CachedAnswer {
                message: message.clone(),
                stored: Instant::now(),
                ttl,
            },
        );
    }
}

#[async_trait]
impl ChainHandler for CacheHandler {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn serve(
        &self,
        ctx: &QueryContext,
        request: &Message,
    ) -> Result<ServeOutcome, DomainError> {
        let key = (ctx.qname_arc(), ctx.record_type());

        if let Some(hit) = self.lookup(&key, request.id()) {
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit();
            }
            debug!(qname = %ctx.qname(), qtype = %ctx.record_type(), "Cache hit");
            return Ok(ServeOutcome::Answered(hit));
        }

        for handler in &self.inner {
            match handler.serve(ctx, request).await? {
                ServeOutcome::Answered(response) => {
                    self.store(key, &response);
                    return Ok(ServeOutcome::Answered(response));
                }
                ServeOutcome::Pass => continue,
            }
        }
        Ok(ServeOutcome::Pass)
    }
}
