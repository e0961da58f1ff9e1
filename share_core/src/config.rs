use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Env var naming an optional JSON config file
pub const CONFIG_PATH_ENV: &str = "SHARE_CONFIG";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STATIC_DIR: &str = "public";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Lifetime of an announced code (5 minutes)
    pub otp_ttl_secs: u64,
    /// How often expired codes are purged
    pub sweep_interval_secs: u64,
    pub ping_interval_secs: u64,
    /// Cap on concurrent realtime connections
    pub max_connections: usize,
    /// Per-connection outbound queue depth
    pub outbound_queue: usize,
    pub max_body_bytes: usize,
    /// Directory served for non-API paths
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let static_dir = Path::new(DEFAULT_STATIC_DIR)
            .is_dir()
            .then(|| PathBuf::from(DEFAULT_STATIC_DIR));

        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            otp_ttl_secs: 5 * 60,
            sweep_interval_secs: 60,
            ping_interval_secs: 25,
            max_connections: 256,
            outbound_queue: 64,
            max_body_bytes: 64 * 1024,
            static_dir,
        }
    }
}

impl ServerConfig {
    /// Load config from the process environment: defaults, then the JSON file
    /// named by `SHARE_CONFIG`, then individual env overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::load`] with an injectable env lookup
    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = parse_var::<SocketAddr, _>(lookup, "SHARE_BIND_ADDR")? {
            self.bind_addr = addr;
        }
        // PORT wins over the port part of the bind address (hosting platforms set it)
        if let Some(port) = parse_var::<u16, _>(lookup, "PORT")? {
            self.bind_addr.set_port(port);
        }
        if let Some(ttl) = parse_var(lookup, "SHARE_OTP_TTL_SECS")? {
            self.otp_ttl_secs = ttl;
        }
        if let Some(interval) = parse_var(lookup, "SHARE_SWEEP_INTERVAL_SECS")? {
            self.sweep_interval_secs = interval;
        }
        if let Some(interval) = parse_var(lookup, "SHARE_PING_INTERVAL_SECS")? {
            self.ping_interval_secs = interval;
        }
        if let Some(max) = parse_var(lookup, "SHARE_MAX_CONNECTIONS")? {
            self.max_connections = max;
        }
        if let Some(dir) = lookup("SHARE_STATIC_DIR") {
            self.static_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        Ok(())
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(None),
    }
}
