use crate::service::SOA_MIN_TTL;
use crate::RecordType;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::{SystemTime, UNIX_EPOCH};

/// A resource record in the translator's output, before wire encoding.
///
/// Equality covers name, ttl and rdata; the reply assembler additionally
/// deduplicates on (name, type, rdata) so wildcard-expanded sets never
/// emit the same answer twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rr {
    pub name: String,
    pub ttl: u32,
    pub data: RrData,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RrData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Ns(String),
    Ptr(String),
    Txt(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Soa(SoaData),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoaData {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: i32,
    pub retry: i32,
    pub expire: i32,
    pub minimum: u32,
}

impl Rr {
    pub fn new(name: impl Into<String>, ttl: u32, data: RrData) -> Self {
        Self {
            name: name.into(),
            ttl,
            data,
        }
    }

    pub fn rtype(&self) -> RecordType {
        match self.data {
            RrData::A(_) => RecordType::A,
            RrData::Aaaa(_) => RecordType::AAAA,
            RrData::Cname(_) => RecordType::CNAME,
            RrData::Ns(_) => RecordType::NS,
            RrData::Ptr(_) => RecordType::PTR,
            RrData::Txt(_) => RecordType::TXT,
            RrData::Srv { .. } => RecordType::SRV,
            RrData::Soa(_) => RecordType::SOA,
        }
    }

    /// Identity for answer-section deduplication: (name, type, rdata).
    /// TTL is deliberately excluded.
    pub fn dedup_identity(&self) -> (&str, RecordType, &RrData) {
        (self.name.as_str(), self.rtype(), &self.data)
    }
}

/// Name under which the apex NS record and the SOA mname are synthesized
/// when no backend supplies them.
pub const DEFAULT_NS_LABEL: &str = "ns.dns.";

/// Synthesize the zone SOA used for negative answers and apex SOA queries.
/// `serial` is caller-supplied so the output stays deterministic; `minimum`
/// is floored at the system-wide SOA minimum.
pub fn synthesize_soa(origin: &str, serial: u32, minimum: u32) -> Rr {
    Rr::new(
        origin.to_string(),
        300,
        RrData::Soa(SoaData {
            mname: format!("{}{}", DEFAULT_NS_LABEL, origin),
            rname: format!("hostmaster.{}", origin),
            serial,
            refresh: 7200,
            retry: 1800,
            expire: 86400,
            minimum: minimum.max(SOA_MIN_TTL),
        }),
    )
}

/// Time-based zone serial, the convention for synthesized SOAs.
pub fn unix_serial() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
