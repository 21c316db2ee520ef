use async_trait::async_trait;
use strata_dns_domain::{DomainError, ServiceRecord};

/// Uniform lookup surface every storage backend implements.
///
/// Error contract:
/// - `DomainError::NotFound`: the name does not exist (NXDOMAIN);
/// - `DomainError::NameExists`: the name exists but holds no record of
///   a usable shape (NODATA);
/// - `DomainError::MalformedRecord`: the store produced an unparseable
///   record, surfaced as SERVFAIL with a log line;
/// - `DomainError::Transient`: retry-able store failure.
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// Look up the service records behind `qname` (normalized FQDN).
    ///
    /// With `exact` set, only records matching `qname` label-for-label
    /// are returned; this is how SRV target completion asks for glue.
    /// Without it, `*` and `any` labels in `qname` expand to any label
    /// at that position.
    async fn lookup(&self, qname: &str, exact: bool) -> Result<Vec<ServiceRecord>, DomainError>;

    /// Whether this backend is the source of truth for `qname`. Drives
    /// the AA bit on answers built from its records; pass-through stores
    /// mirroring someone else's data return false.
    fn is_authoritative(&self, qname: &str) -> bool;
}
