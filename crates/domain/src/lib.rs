pub mod config;
pub mod errors;
pub mod name;
pub mod query;
pub mod rcode;
pub mod record_type;
pub mod rr;
pub mod service;

pub use config::{
    CliOverrides, Config, ConfigError, HandlerConfig, LoggingConfig, SelectionPolicy,
    ServerConfig, TtlConfig, UpstreamConfig, ZoneConfig,
};
pub use errors::DomainError;
pub use query::{QueryClass, QueryContext, Transport};
pub use rcode::Rcode;
pub use record_type::RecordType;
pub use rr::{synthesize_soa, unix_serial, Rr, RrData, SoaData, DEFAULT_NS_LABEL};
pub use service::{merge_ttl, HostKind, ServiceRecord, DEFAULT_PRIORITY, DEFAULT_TTL, SOA_MIN_TTL};
