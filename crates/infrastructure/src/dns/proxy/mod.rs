//! Upstream proxy: forwards a DNS message to one of N resolvers with
//! per-host failure tracking, pluggable selection and a bounded retry
//! budget.

mod exchange;
mod host;
mod policy;

pub use exchange::{Exchanger, NetExchanger};
pub use host::UpstreamHost;
pub use policy::Policy;

pub(crate) use exchange::{read_framed, write_framed};

use crate::dns::codec;
use crate::dns::metrics::ServerMetrics;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_dns_application::ports::UpstreamLookup;
use strata_dns_domain::{DomainError, RecordType, Rr, Transport, UpstreamConfig};
use tracing::{debug, warn};

pub struct Proxy {
    hosts: Vec<Arc<UpstreamHost>>,
    policy: Policy,
    try_duration: Duration,
    attempt_timeout: Duration,
    exchanger: Arc<dyn Exchanger>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Proxy {
    pub fn from_config(
        config: &UpstreamConfig,
        exchanger: Arc<dyn Exchanger>,
    ) -> Result<Self, DomainError> {
        if config.servers.is_empty() {
            return Err(DomainError::ConfigError(
                "upstream pool has no servers".to_string(),
            ));
        }
        let fail_timeout = Duration::from_secs(config.fail_timeout_secs);
        let hosts = config
            .servers
            .iter()
            .map(|server| {
                server
                    .parse()
                    .map(|addr| Arc::new(UpstreamHost::new(addr, fail_timeout, config.max_fails)))
                    .map_err(|e| {
                        DomainError::ConfigError(format!("invalid upstream '{}': {}", server, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            hosts,
            policy: Policy::from_config(config.policy),
            try_duration: Duration::from_secs(config.try_duration_secs),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            exchanger,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn hosts(&self) -> &[Arc<UpstreamHost>] {
        &self.hosts
    }

    /// Forward an already-parsed client request and return the upstream's
    /// answer re-tagged with the client's query id.
    pub async fn forward(
        &self,
        transport: Transport,
        request: &Message,
    ) -> Result<Message, DomainError> {
        let payload = codec::serialize(request)?;
        let mut response = self.exchange_with_retry(&payload, transport).await?;
        response.set_id(request.id());
        Ok(response)
    }

    /// Retry transient failures against different hosts until the try
    /// budget runs out or no healthy host remains. A truncated UDP answer
    /// is retried over TCP against the same host and that answer wins.
    pub async fn exchange_with_retry(
        &self,
        payload: &[u8],
        transport: Transport,
    ) -> Result<Message, DomainError> {
        let start = Instant::now();
        let mut previous: Option<std::net::SocketAddr> = None;

        while start.elapsed() < self.try_duration {
            let Some(host) = self.select_preferring_new(previous) else {
                return Err(DomainError::TransportNoHealthyServers);
            };
            previous = Some(host.addr());

            host.conns_inc();
            let attempt = self
                .exchanger
                .exchange(host.addr(), payload, self.attempt_timeout, transport)
                .await;
            host.conns_dec();

            match attempt {
                Ok(bytes) => {
                    let message = Message::from_vec(&bytes).map_err(|e| {
                        DomainError::InvalidDnsResponse(format!(
                            "upstream {}: {}",
                            host.addr(),
                            e
                        ))
                    })?;
                    if message.truncated() && transport == Transport::Udp {
                        debug!(server = %host.addr(), "Truncated UDP answer, retrying over TCP");
                        return self.retry_over_tcp(&host, payload).await;
                    }
                    return Ok(message);
                }
                Err(err) if err.is_transient() => {
                    warn!(server = %host.addr(), error = %err, "Upstream attempt failed");
                    host.record_failure();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_upstream_failure();
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(DomainError::TransportAllServersUnreachable)
    }

    /// Prefer a host other than the previous attempt's when more than one
    /// is healthy.
    fn select_preferring_new(
        &self,
        previous: Option<std::net::SocketAddr>,
    ) -> Option<Arc<UpstreamHost>> {
        let first = self.policy.select(&self.hosts)?;
        match previous {
            Some(prev) if first.addr() == prev => {
                let second = self.policy.select(&self.hosts)?;
                if second.addr() != prev {
                    Some(second)
                } else {
                    Some(first)
                }
            }
            _ => Some(first),
        }
    }

    async fn retry_over_tcp(
        &self,
        host: &Arc<UpstreamHost>,
        payload: &[u8],
    ) -> Result<Message, DomainError> {
        host.conns_inc();
        let attempt = self
            .exchanger
            .exchange(host.addr(), payload, self.attempt_timeout, Transport::Tcp)
            .await;
        host.conns_dec();

        match attempt {
            Ok(bytes) => Message::from_vec(&bytes).map_err(|e| {
                DomainError::InvalidDnsResponse(format!("upstream {}: {}", host.addr(), e))
            }),
            Err(err) => {
                if err.is_transient() {
                    host.record_failure();
                    if let Some(metrics) = &self.metrics {
                        metrics.record_upstream_failure();
                    }
                }
                Err(err)
            }
        }
    }
}

/// The translator's window to the outside world: resolve a name the local
/// backend does not own.
#[async_trait]
impl UpstreamLookup for Proxy {
    async fn lookup(&self, qname: &str, rtype: RecordType) -> Result<Vec<Rr>, DomainError> {
        let (id, payload) = codec::build_query(qname, rtype)?;
        let response = self.exchange_with_retry(&payload, Transport::Udp).await?;
        if response.id() != id {
            return Err(DomainError::InvalidDnsResponse(
                "upstream answered with a mismatched id".to_string(),
            ));
        }
        Ok(response
            .answers()
            .iter()
            .filter_map(codec::record_to_rr)
            .collect())
    }
}
