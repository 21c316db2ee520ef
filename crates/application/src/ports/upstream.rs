use async_trait::async_trait;
use strata_dns_domain::{DomainError, RecordType, Rr};

/// Resolution of names living outside the local zones, backed by the
/// upstream proxy. The translator uses it to complete CNAME chains and
/// SRV target addresses it cannot answer from its own backend.
#[async_trait]
pub trait UpstreamLookup: Send + Sync {
    async fn lookup(&self, qname: &str, rtype: RecordType) -> Result<Vec<Rr>, DomainError>;
}
