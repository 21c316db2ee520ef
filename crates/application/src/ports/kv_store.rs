use async_trait::async_trait;
use strata_dns_domain::DomainError;

/// One leaf node in the key-value tree. `ttl` is the storage-layer TTL
/// (lease time); zero means the store set none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvNode {
    pub key: String,
    pub value: String,
    pub ttl: u32,
}

/// Thin interface over the external key-value client. Implementations
/// flatten directories: `fetch` returns every leaf at or below `path`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `DomainError::NotFound` when the path does not exist,
    /// `DomainError::Transient` on connection-level failures.
    async fn fetch(&self, path: &str) -> Result<Vec<KvNode>, DomainError>;
}
