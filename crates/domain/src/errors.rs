use crate::Rcode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid service record at {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("Name not found")]
    NotFound,

    #[error("Name exists but holds no record of the requested type")]
    NameExists,

    #[error("Transient backend failure: {0}")]
    Transient(String),

    #[error("CNAME loop detected at {0}")]
    CnameLoop(String),

    #[error("CNAME chain exceeded {max} hops at {name}")]
    CnameChainTooLong { name: String, max: usize },

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("Query deadline exceeded")]
    DeadlineExceeded,

    #[error("Query cancelled by client")]
    Cancelled,

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}")]
    TransportConnectionRefused { server: String },

    #[error("Transport connection reset by {server}")]
    TransportConnectionReset { server: String },

    #[error("No healthy upstream servers available")]
    TransportNoHealthyServers,

    #[error("All upstream servers are unreachable")]
    TransportAllServersUnreachable,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl DomainError {
    /// True when retrying against a different upstream host may help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::Transient(_)
                | DomainError::TransportTimeout { .. }
                | DomainError::TransportConnectionRefused { .. }
                | DomainError::TransportConnectionReset { .. }
                | DomainError::IoError(_)
        )
    }

    /// Wire response code this error maps to when it escapes a handler chain.
    pub fn rcode(&self) -> Rcode {
        match self {
            DomainError::NotFound => Rcode::NxDomain,
            DomainError::NameExists => Rcode::NoError,
            DomainError::InvalidDomainName(_) => Rcode::FormErr,
            _ => Rcode::ServFail,
        }
    }
}
