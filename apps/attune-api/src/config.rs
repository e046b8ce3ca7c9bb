use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_DATA_DIR: &str = "data";

/// Well-known placeholder accepted when no admin key is configured.
/// Deployments must override it via `AT_ADMIN_KEY`.
pub const DEFAULT_ADMIN_KEY: &str = "attune_admin_key_change_me";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub data_dir: Option<PathBuf>,
    pub admin_key: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid AT_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env::var("AT_BIND_ADDR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr_raw,
                source,
            })?;

        let log_filter = env::var("AT_LOG_FILTER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let data_dir = env::var("AT_DATA_DIR")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(DEFAULT_DATA_DIR)));

        let admin_key = env::var("AT_ADMIN_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_KEY.to_string());

        Ok(Self {
            bind_addr,
            log_filter,
            data_dir,
            admin_key,
        })
    }

    pub fn uses_placeholder_admin_key(&self) -> bool {
        self.admin_key == DEFAULT_ADMIN_KEY
    }

    pub fn tokens_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("tokens.json"))
    }

    pub fn settings_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("settings.json"))
    }

    /// In-memory stores, placeholder admin key.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            data_dir: None,
            admin_key: DEFAULT_ADMIN_KEY.to_string(),
        }
    }
}
