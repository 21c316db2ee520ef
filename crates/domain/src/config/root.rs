use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::zone::ZoneConfig;
use crate::name;
use crate::service::{DEFAULT_TTL, SOA_MIN_TTL};

/// Main configuration structure for strata-dns.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub zones: Vec<ZoneConfig>,

    #[serde(default)]
    pub ttl: TtlConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// TTL defaults applied when neither storage nor record set one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtlConfig {
    #[serde(default = "default_answer_ttl")]
    pub default: u32,

    /// Floor for the synthesized SOA minimum field only.
    #[serde(default = "default_soa_minimum")]
    pub soa_minimum: u32,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default: default_answer_ttl(),
            soa_minimum: default_soa_minimum(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults.
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. strata-dns.toml in the current directory
    /// 3. /etc/strata-dns/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("strata-dns.toml").exists() {
            Self::from_file("strata-dns.toml")?
        } else if std::path::Path::new("/etc/strata-dns/config.toml").exists() {
            Self::from_file("/etc/strata-dns/config.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(overrides);
        config.normalize_origins();
        Ok(config)
    }

    pub fn from_str_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.normalize_origins();
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.dns_port {
            self.server.dns_port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Zone origins are compared by suffix everywhere; store them
    /// normalized once instead of normalizing per query.
    fn normalize_origins(&mut self) {
        for zone in &mut self.zones {
            zone.origin = name::normalize(&zone.origin);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.dns_port == 0 {
            return Err(ConfigError::Validation("DNS port cannot be 0".to_string()));
        }
        if self.ttl.default == 0 {
            return Err(ConfigError::Validation(
                "ttl.default cannot be 0; zero means unset".to_string(),
            ));
        }
        for zone in &self.zones {
            if zone.handlers.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Zone '{}' has no handlers",
                    zone.origin
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for zone in &self.zones {
            if !seen.insert(zone.origin.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Zone '{}' is configured twice",
                    zone.origin
                )));
            }
        }
        Ok(())
    }
}

/// Command-line overrides for configuration.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub dns_port: Option<u16>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
}

fn default_answer_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_soa_minimum() -> u32 {
    SOA_MIN_TTL
}
