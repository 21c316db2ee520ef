use crate::name;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Priority assigned when a stored record leaves it unset.
pub const DEFAULT_PRIORITY: u16 = 10;

/// Answer TTL when neither the storage layer nor the record set one.
pub const DEFAULT_TTL: u32 = 300;

/// Floor for the SOA minimum field. Does not apply to answer TTLs.
pub const SOA_MIN_TTL: u32 = 60;

/// The backend-agnostic record every storage adapter emits.
///
/// `host` carries either an address or a target name; which one decides
/// how the translator renders the record (§ A/AAAA vs CNAME indirection,
/// SRV target synthesis). `key` is the opaque backend path the record came
/// from and feeds synthetic SRV targets and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRecord {
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

    #[serde(skip)]
    pub key: String,

    #[serde(skip)]
    pub target_strip_labels: usize,
}

/// Exactly one of these is valid for a record's `host` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Name(String),
}

impl ServiceRecord {
    pub fn new(host: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 0,
            priority: 0,
            weight: 0,
            ttl: 0,
            text: String::new(),
            key: key.into(),
            target_strip_labels: 0,
        }
    }

    /// Classify `host` as IPv4, IPv6 or a target name (normalized).
    pub fn host_kind(&self) -> HostKind {
        if let Ok(v4) = self.host.parse::<Ipv4Addr>() {
            return HostKind::V4(v4);
        }
        if let Ok(v6) = self.host.parse::<Ipv6Addr>() {
            return HostKind::V6(v6);
        }
        HostKind::Name(name::normalize(&self.host))
    }

    /// Fill unset fields after the backend produced the record.
    pub fn apply_defaults(&mut self) {
        if self.priority == 0 {
            self.priority = DEFAULT_PRIORITY;
        }
    }

    /// Identity used to drop duplicates from wildcard-expanded sets.
    pub fn identity(&self) -> (&str, u16, u16, u16, &str, &str) {
        (
            &self.host,
            self.port,
            self.priority,
            self.weight,
            &self.text,
            &self.key,
        )
    }

    /// Synthetic target name for SRV answers whose host is an address.
    /// Derived from the storage key, with the leading `target_strip_labels`
    /// labels removed.
    pub fn target_name(&self) -> String {
        let domain = name::domain_from_key(&self.key);
        if self.target_strip_labels == 0 {
            return domain;
        }
        let labels = name::labels(&domain);
        if self.target_strip_labels >= labels.len() {
            return ".".to_string();
        }
        format!("{}.", labels[self.target_strip_labels..].join("."))
    }
}

/// TTL merge rule: the smaller of the storage TTL and the record TTL,
/// where zero means unset. Both unset yields `default_ttl`. Explicit
/// TTL=0 is indistinguishable from unset and is treated as unset.
pub fn merge_ttl(storage_ttl: u32, record_ttl: u32, default_ttl: u32) -> u32 {
    match (storage_ttl, record_ttl) {
        (0, 0) => default_ttl,
        (0, r) => r,
        (s, 0) => s,
        (s, r) => s.min(r),
    }
}
