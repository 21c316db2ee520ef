//! Wires configuration into the runtime object graph: one handler chain
//! per zone, sharing a single metrics sink.

use serde::Deserialize;
use std::sync::Arc;
use strata_dns_application::use_cases::ServiceResolver;
use strata_dns_domain::{Config, DomainError, UpstreamConfig, ZoneConfig};
use strata_dns_infrastructure::dns::backends::{KvBackend, MemoryBackend, StaticKvStore};
use strata_dns_infrastructure::dns::handlers::{BackendHandler, CacheHandler, ForwardHandler};
use strata_dns_infrastructure::dns::proxy::{NetExchanger, Proxy};
use strata_dns_infrastructure::dns::{
    ChainHandler, RouterTable, ServerMetrics, ZoneChain, ZoneRouter,
};

pub fn build_router(config: &Config, metrics: Arc<ServerMetrics>) -> Result<ZoneRouter, DomainError> {
    let mut zones = Vec::with_capacity(config.zones.len());
    for zone in &config.zones {
        let handlers = build_chain(zone, &zone.handlers, config, &metrics)?;
        zones.push(ZoneChain::new(zone.origin.clone(), handlers));
    }
    Ok(ZoneRouter::new(
        RouterTable::new(zones),
        metrics,
        config.logging.query_log,
        config.ttl.soa_minimum,
    ))
}

/// Build the chain for `entries`, a suffix of a zone's handler list. The
/// cache handler consumes the remainder of its chain as its inner
/// handlers, so this recurses at most once per cache entry.
fn build_chain(
    zone: &ZoneConfig,
    entries: &[strata_dns_domain::HandlerConfig],
    config: &Config,
    metrics: &Arc<ServerMetrics>,
) -> Result<Vec<Arc<dyn ChainHandler>>, DomainError> {
    let mut handlers: Vec<Arc<dyn ChainHandler>> = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        match entry.name.as_str() {
            "memory" => {
                let backend = Arc::new(MemoryBackend::from_options(&entry.options)?);
                let mut resolver = ServiceResolver::new(
                    backend,
                    zone.origin.clone(),
                    config.ttl.default,
                    config.ttl.soa_minimum,
                );
                if let Some(proxy) = optional_upstream(&entry.options, metrics)? {
                    resolver = resolver.with_external(proxy);
                }
                handlers.push(Arc::new(BackendHandler::new(
                    "memory",
                    resolver,
                    entry.fallthrough,
                )));
            }
            "kv" => {
                let options: KvOptions = entry.options.clone().try_into().map_err(|e| {
                    DomainError::ConfigError(format!("kv handler options: {}", e))
                })?;
                let store = StaticKvStore::new();
                for node in &options.seed {
                    store.insert(node.key.clone(), node.value.clone(), node.ttl);
                }
                let backend = Arc::new(
                    KvBackend::new(Arc::new(store), options.prefix, config.ttl.default)
                        .with_metrics(Arc::clone(metrics)),
                );
                let mut resolver = ServiceResolver::new(
                    backend,
                    zone.origin.clone(),
                    config.ttl.default,
                    config.ttl.soa_minimum,
                );
                if let Some(proxy) = optional_upstream(&entry.options, metrics)? {
                    resolver = resolver.with_external(proxy);
                }
                handlers.push(Arc::new(BackendHandler::new(
                    "kv",
                    resolver,
                    entry.fallthrough,
                )));
            }
            "forward" => {
                let upstream: UpstreamConfig = entry.options.clone().try_into().map_err(|e| {
                    DomainError::ConfigError(format!("forward handler options: {}", e))
                })?;
                let proxy = Proxy::from_config(&upstream, Arc::new(NetExchanger))?
                    .with_metrics(Arc::clone(metrics));
                handlers.push(Arc::new(ForwardHandler::new(Arc::new(proxy))));
            }
            "cache" => {
                let inner = build_chain(zone, &entries[index + 1..], config, metrics)?;
                handlers.push(Arc::new(
                    CacheHandler::from_options(&entry.options, inner)?
                        .with_metrics(Arc::clone(metrics)),
                ));
                return Ok(handlers);
            }
            other => {
                return Err(DomainError::ConfigError(format!(
                    "zone '{}': unknown handler '{}'",
                    zone.origin, other
                )));
            }
        }
    }

    Ok(handlers)
}

/// Some backend handlers carry their own upstream pool for names their
/// store cannot answer (out-of-zone CNAME targets, SRV glue).
fn optional_upstream(
    options: &toml::Value,
    metrics: &Arc<ServerMetrics>,
) -> Result<Option<Arc<Proxy>>, DomainError> {
    #[derive(Deserialize)]
    struct UpstreamOpt {
        #[serde(default)]
        upstream: Option<UpstreamConfig>,
    }

    let parsed: UpstreamOpt = options
        .clone()
        .try_into()
        .unwrap_or(UpstreamOpt { upstream: None });
    match parsed.upstream {
        Some(upstream) => {
            let proxy = Proxy::from_config(&upstream, Arc::new(NetExchanger))?
                .with_metrics(Arc::clone(metrics));
            Ok(Some(Arc::new(proxy)))
        }
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct KvOptions {
    #[serde(default = "default_prefix")]
    prefix: String,

    /// Records preloaded into the in-process store. Production
    /// deployments swap the store behind the `KvStore` port for a real
    /// client; the seed keeps single-binary setups useful.
    #[serde(default)]
    seed: Vec<KvSeed>,
}

#[derive(Debug, Deserialize)]
struct KvSeed {
    key: String,
    value: String,
    #[serde(default)]
    ttl: u32,
}

fn default_prefix() -> String {
    "strata".to_string()
}
