// Configuration loading and validation for the fleet processes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";

pub const CONFIG_PATH: &str = "cfg/fleet.cfg.yaml";
pub const CONFIG_PATH_LOCAL: &str = "cfg/fleet.cfg.local.yaml";

/// Ports at or below this value are reserved and rejected at startup.
pub const MIN_PORT: u16 = 1024;

const DEFAULT_TTL: Duration = Duration::from_secs(30);
const DEFAULT_CAPACITY: usize = 128;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid node address {addr:?}: expected host:port ({reason})")]
    InvalidAddr { addr: String, reason: String },
    #[error("{field} must be greater than {MIN_PORT}, got {port}")]
    ReservedPort { field: &'static str, port: u16 },
    #[error("proxy port and origin port cannot be the same ({port})")]
    PortClash { port: u16 },
    #[error("lru capacity must be at least 1")]
    ZeroCapacity,
}

/// A proxy or origin endpoint, written `host:port` in config files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| ConfigError::InvalidAddr {
            addr: s.to_string(),
            reason: "missing ':'".to_string(),
        })?;
        if host.is_empty() {
            return Err(ConfigError::InvalidAddr {
                addr: s.to_string(),
                reason: "empty host".to_string(),
            });
        }
        let port = port.parse::<u16>().map_err(|e| ConfigError::InvalidAddr {
            addr: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl TryFrom<String> for NodeAddr {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NodeAddr> for String {
    fn from(addr: NodeAddr) -> Self {
        addr.to_string()
    }
}

/// A local bind endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Listen {
    pub host: String,
    pub port: u16,
}

impl Listen {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

/// Which cache engine a proxy node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Ttl,
    Lru,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub engine: CacheKind,
    /// Entry lifetime for the TTL engine.
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,
    /// Maximum entry count for the LRU engine.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Balancing policy over the configured proxy list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    LeastLoaded,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RoundRobin => f.write_str("round_robin"),
            Strategy::LeastLoaded => f.write_str("least_loaded"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub listen: Listen,
    /// Upstream origin endpoint.
    pub origin: NodeAddr,
    pub cache: CacheConfig,
}

impl ProxyConfig {
    /// Startup sanity rules; violations are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.port <= MIN_PORT {
            return Err(ConfigError::ReservedPort {
                field: "proxy.listen.port",
                port: self.listen.port,
            });
        }
        if self.origin.port <= MIN_PORT {
            return Err(ConfigError::ReservedPort {
                field: "proxy.origin port",
                port: self.origin.port,
            });
        }
        if self.listen.port == self.origin.port {
            return Err(ConfigError::PortClash {
                port: self.listen.port,
            });
        }
        if self.cache.engine == CacheKind::Lru && self.cache.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalancerConfig {
    pub listen: Listen,
    /// Ordered proxy pool; immutable after startup.
    #[serde(default)]
    pub proxies: Vec<NodeAddr>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OriginConfig {
    pub listen: Listen,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Root of the fleet config file. Each binary reads its own section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FleetConfig {
    #[serde(default = "default_env")]
    pub env: String,
    pub logs: Option<Logs>,
    pub proxy: Option<ProxyConfig>,
    pub balancer: Option<BalancerConfig>,
    pub origin: Option<OriginConfig>,
}

impl FleetConfig {
    /// Loads the config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        Ok(cfg)
    }

    /// Loads a custom config path if given, otherwise tries the local
    /// config first and falls back to the default one.
    pub fn load_with_fallback(custom: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = custom {
            return Self::load(&path)
                .with_context(|| format!("failed to load custom config from {:?}", path));
        }
        match Self::load(CONFIG_PATH_LOCAL) {
            Ok(cfg) => Ok(cfg),
            Err(_) => Self::load(CONFIG_PATH)
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH)),
        }
    }

    pub fn is_prod(&self) -> bool {
        self.env == PROD
    }

    pub fn log_level(&self) -> &str {
        self.logs
            .as_ref()
            .and_then(|logs| logs.level.as_deref())
            .unwrap_or("debug")
    }
}

fn default_env() -> String {
    DEV.to_string()
}

fn default_ttl() -> Duration {
    DEFAULT_TTL
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
