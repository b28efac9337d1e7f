use log::warn;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_P2P_PORT: u16 = 6001;
pub const DEFAULT_PRIVATE_KEY_PATH: &str = "wallet/private_key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub http_port: u16,
    pub p2p_port: u16,
    pub private_key_path: PathBuf,
    /// Bootstrap peers as `host:port`.
    pub peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            p2p_port: DEFAULT_P2P_PORT,
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
            peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Read the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: get("HOST").unwrap_or(defaults.host),
            http_port: parse_port(get("HTTP_PORT"), "HTTP_PORT", defaults.http_port),
            p2p_port: parse_port(get("P2P_PORT"), "P2P_PORT", defaults.p2p_port),
            private_key_path: get("PRIVATE_KEY")
                .map(PathBuf::from)
                .unwrap_or(defaults.private_key_path),
            peers: get("PEERS").map(|v| parse_peers(&v)).unwrap_or_default(),
        }
    }
}

fn parse_port(value: Option<String>, key: &str, default: u16) -> u16 {
    match value {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("{key}={v:?} is not a valid port, using {default}");
            default
        }),
    }
}

fn parse_peers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
