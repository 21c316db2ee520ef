use super::{path_labels, wildcard_match};
use async_trait::async_trait;
use serde::Deserialize;
use strata_dns_application::ports::ServiceBackend;
use strata_dns_domain::{name, DomainError, ServiceRecord};

/// Zone data served straight from configuration. The text parsing of
/// real zone files happens outside; this adapter receives the already
/// structured records.
pub struct MemoryBackend {
    entries: Vec<(String, ServiceRecord)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryOptions {
    #[serde(default)]
    pub records: Vec<MemoryRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryRecord {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub priority: u16,
    #[serde(default)]
    pub weight: u16,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub text: String,
}

const KEY_PREFIX: &str = "memory";

impl MemoryBackend {
    pub fn from_options(options: &toml::Value) -> Result<Self, DomainError> {
        let options: MemoryOptions = options
            .clone()
            .try_into()
            .map_err(|e| DomainError::ConfigError(format!("memory handler options: {}", e)))?;
        Ok(Self::new(options.records))
    }

    pub fn new(records: Vec<MemoryRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| {
                let owner = name::normalize(&record.name);
                let mut service =
                    ServiceRecord::new(record.host, name::key_for_name(&owner, KEY_PREFIX));
                service.port = record.port;
                service.priority = record.priority;
                service.weight = record.weight;
                service.ttl = record.ttl;
                service.text = record.text;
                (owner, service)
            })
            .collect();
        Self { entries }
    }

    /// True when stored data exists strictly beneath `qname`: an empty
    /// non-terminal, which answers NODATA rather than NXDOMAIN.
    fn has_descendants(&self, qname: &str) -> bool {
        self.entries
            .iter()
            .any(|(owner, _)| owner != qname && name::is_subdomain(qname, owner))
    }
}

#[async_trait]
impl ServiceBackend for MemoryBackend {
    async fn lookup(&self, qname: &str, exact: bool) -> Result<Vec<ServiceRecord>, DomainError> {
        let qname = name::normalize(qname);
        let query_path = path_labels(&qname);

        let matched: Vec<ServiceRecord> = self
            .entries
            .iter()
            .filter(|(owner, _)| {
                if exact {
                    owner == &qname
                } else {
                    wildcard_match(&query_path, &path_labels(owner))
                }
            })
            .map(|(_, service)| service.clone())
            .collect();

        if matched.is_empty() {
            if self.has_descendants(&qname) {
                return Err(DomainError::NameExists);
            }
            return Err(DomainError::NotFound);
        }
        Ok(matched)
    }

    /// Configured records are the zone's own data, so every answer built
    /// from them (negative ones included) is authoritative.
    fn is_authoritative(&self, _qname: &str) -> bool {
        true
    }
}
