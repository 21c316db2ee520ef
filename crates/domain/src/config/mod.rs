mod errors;
mod logging;
mod root;
mod server;
mod upstream;
mod zone;

pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config, TtlConfig};
pub use server::ServerConfig;
pub use upstream::{SelectionPolicy, UpstreamConfig};
pub use zone::{HandlerConfig, ZoneConfig};
