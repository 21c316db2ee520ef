use super::{is_wildcard, path_labels, wildcard_match};
use crate::dns::metrics::ServerMetrics;
use crate::dns::singleflight::Group;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use strata_dns_application::ports::{KvNode, KvStore, ServiceBackend};
use strata_dns_domain::{merge_ttl, name, DomainError, ServiceRecord};
use tracing::debug;

/// Service records stored as JSON leaves in a path tree, one label per
/// path segment under a configurable prefix. Concurrent fetches for the
/// same subtree collapse into a single store round-trip.
pub struct KvBackend {
    store: Arc<dyn KvStore>,
    prefix: String,
    default_ttl: u32,
    inflight: Group<Vec<KvNode>>,
}

impl KvBackend {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>, default_ttl: u32) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            default_ttl,
            inflight: Group::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.inflight = Group::new().with_metrics(metrics);
        self
    }

    /// Storage path for a query. Wildcard labels cut the path short: the
    /// subtree above the first wildcard is fetched and filtered locally.
    fn query_path(&self, qname: &str) -> (String, bool) {
        let labels = path_labels(qname);
        let mut segments = Vec::with_capacity(labels.len());
        let mut star = false;
        for label in &labels {
            if is_wildcard(label) {
                star = true;
                break;
            }
            segments.push(label.clone());
        }
        (format!("/{}/{}", self.prefix, segments.join("/")), star)
    }

    /// Node key relative to the prefix, as root-first labels.
    fn node_path(&self, key: &str) -> Vec<String> {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .skip(1)
            .map(|segment| segment.to_string())
            .collect()
    }

    fn parse_node(&self, node: &KvNode) -> Result<ServiceRecord, DomainError> {
        let mut service: ServiceRecord =
            serde_json::from_str(&node.value).map_err(|e| DomainError::MalformedRecord {
                key: node.key.clone(),
                reason: e.to_string(),
            })?;
        if service.host.is_empty() {
            return Err(DomainError::MalformedRecord {
                key: node.key.clone(),
                reason: "record has no host".to_string(),
            });
        }
        service.key = node.key.clone();
        service.ttl = merge_ttl(node.ttl, service.ttl, self.default_ttl);
        Ok(service)
    }
}

#[async_trait]
impl ServiceBackend for KvBackend {
    async fn lookup(&self, qname: &str, exact: bool) -> Result<Vec<ServiceRecord>, DomainError> {
        let qname = name::normalize(qname);
        let (path, star) = self.query_path(&qname);

        let store = Arc::clone(&self.store);
        let fetch_path = path.clone();
        let nodes = self
            .inflight
            .run(&path, async move { store.fetch(&fetch_path).await })
            .await?;

        let query_path = path_labels(&qname);
        let mut services = Vec::new();
        for node in nodes.iter() {
            let node_path = self.node_path(&node.key);
            let matches = if exact || !star {
                node_path.len() == query_path.len() && wildcard_match(&query_path, &node_path)
            } else {
                wildcard_match(&query_path, &node_path)
            };
            if !matches {
                continue;
            }
            services.push(self.parse_node(node)?);
        }

        if services.is_empty() {
            // The tree cannot cheaply prove name-presence, so absence of
            // matches is reported as the name not existing.
            debug!(qname = %qname, path = %path, "No KV records matched");
            return Err(DomainError::NotFound);
        }
        Ok(services)
    }

    /// The tree under our prefix is the source of truth for the zones it
    /// serves.
    fn is_authoritative(&self, _qname: &str) -> bool {
        true
    }
}

/// In-process tree used in tests and as the stand-in where a real KV
/// client would be injected. Path semantics mirror the store contract:
/// `fetch` returns every leaf at or below the path.
#[derive(Default)]
pub struct StaticKvStore {
    nodes: DashMap<String, KvNode>,
}

impl StaticKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>, ttl: u32) {
        let key = key.into();
        self.nodes.insert(
            key.clone(),
            KvNode {
                key,
                value: value.into(),
                ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.nodes.remove(key);
    }
}

#[async_trait]
impl KvStore for StaticKvStore {
    async fn fetch(&self, path: &str) -> Result<Vec<KvNode>, DomainError> {
        let mut out: Vec<KvNode> = self
            .nodes
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key == path || key.starts_with(&format!("{}/", path))
            })
            .map(|entry| entry.value().clone())
            .collect();
        if out.is_empty() {
            return Err(DomainError::NotFound);
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> KvBackend {
        let store = StaticKvStore::new();
        store.insert(
            "/strata/org/example/www",
            r#"{"host":"1.2.3.4"}"#,
            0,
        );
        store.insert(
            "/strata/org/example/svc/a",
            r#"{"host":"10.0.0.1","port":80,"priority":10,"weight":5}"#,
            0,
        );
        store.insert(
            "/strata/org/example/svc/b",
            r#"{"host":"10.0.0.2","port":80,"priority":10,"weight":5}"#,
            120,
        );
        KvBackend::new(Arc::new(store), "strata", 300)
    }

    #[tokio::test]
    async fn plain_lookup_returns_single_leaf() {
        let backend = seeded();
        let services = backend.lookup("www.example.org.", false).await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].host, "1.2.3.4");
        assert_eq!(services[0].key, "/strata/org/example/www");
        assert_eq!(services[0].ttl, 300, "unset ttl falls back to default");
    }

    #[tokio::test]
    async fn wildcard_expands_subtree() {
        let backend = seeded();
        let services = backend.lookup("*.svc.example.org.", false).await.unwrap();
        assert_eq!(services.len(), 2);
    }

    #[tokio::test]
    async fn any_label_behaves_like_star() {
        let backend = seeded();
        let services = backend.lookup("any.svc.example.org.", false).await.unwrap();
        assert_eq!(services.len(), 2);
    }

    #[tokio::test]
    async fn storage_ttl_caps_record_ttl() {
        let backend = seeded();
        let services = backend.lookup("b.svc.example.org.", false).await.unwrap();
        assert_eq!(services[0].ttl, 120);
    }

    #[tokio::test]
    async fn absent_name_is_not_found() {
        let backend = seeded();
        let err = backend.lookup("nope.example.org.", false).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn malformed_json_surfaces_with_key() {
        let store = StaticKvStore::new();
        store.insert("/strata/org/example/bad", "not-json", 0);
        let backend = KvBackend::new(Arc::new(store), "strata", 300);
        let err = backend.lookup("bad.example.org.", false).await.unwrap_err();
        match err {
            DomainError::MalformedRecord { key, .. } => {
                assert_eq!(key, "/strata/org/example/bad")
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }
}
