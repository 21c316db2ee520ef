use serde::{Deserialize, Serialize};

/// One served origin and the ordered handler chain beneath it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZoneConfig {
    /// Zone origin; normalized to lowercase FQDN at load time.
    pub origin: String,

    pub handlers: Vec<HandlerConfig>,
}

/// A named handler with its option bag. The bag is opaque here; the
/// wiring layer deserializes it into the handler's own option struct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlerConfig {
    pub name: String,

    /// Converts this handler's NXDOMAIN into "declined" so the next
    /// handler in the chain gets a chance.
    #[serde(default)]
    pub fallthrough: bool,

    #[serde(default = "empty_options")]
    pub options: toml::Value,
}

fn empty_options() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}
