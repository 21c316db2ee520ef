use serde::{Deserialize, Serialize};

/// Upstream resolver pool used by forward handlers and stub zones.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Resolver endpoints, e.g. "9.9.9.9:53".
    pub servers: Vec<String>,

    #[serde(default)]
    pub policy: SelectionPolicy,

    /// Failures within the fail window that mark a host unhealthy.
    #[serde(default = "default_max_fails")]
    pub max_fails: u32,

    /// Each failure is forgotten this long after it was recorded.
    #[serde(default = "default_fail_timeout_secs")]
    pub fail_timeout_secs: u64,

    /// Overall retry budget for one proxied query across hosts.
    #[serde(default = "default_try_duration_secs")]
    pub try_duration_secs: u64,

    /// Per-attempt exchange timeout.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            servers: vec![],
            policy: SelectionPolicy::default(),
            max_fails: default_max_fails(),
            fail_timeout_secs: default_fail_timeout_secs(),
            try_duration_secs: default_try_duration_secs(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// How the proxy picks among healthy hosts.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Uniform over healthy hosts.
    #[default]
    Random,
    /// Monotonic counter modulo healthy count.
    RoundRobin,
    /// Host with the fewest active exchanges, first wins ties.
    LeastConn,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RoundRobin => "round_robin",
            Self::LeastConn => "least_conn",
        }
    }
}

fn default_max_fails() -> u32 {
    1
}

fn default_fail_timeout_secs() -> u64 {
    10
}

fn default_try_duration_secs() -> u64 {
    60
}

fn default_attempt_timeout_ms() -> u64 {
    2000
}
