//! Configuration for the rendezvous relay
//!
//! Supports TOML configuration files with sensible defaults.
//! Configuration is loaded from:
//! - macOS: ~/Library/Application Support/rendezvous/config.toml
//! - Linux: ~/.config/rendezvous/config.toml
//! - Windows: %APPDATA%/rendezvous/config.toml

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8081;

/// Default keepalive interval in seconds
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

/// Default maximum relayed body size (1 MB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relay settings
    pub relay: RelayConfig,
    /// Static file fallback
    pub static_files: StaticConfig,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listen port
    pub port: u16,
    /// Bind address
    pub bind: IpAddr,
    /// Keepalive interval for presence channels in seconds
    pub keepalive_interval_secs: u64,
    /// Maximum size of a relayed payload
    pub max_body_bytes: usize,
    /// Drop sessions from the registry once their last participant leaves
    pub reclaim_empty_sessions: bool,
    /// Transform handshake payloads between compact and structured SDP
    pub transform: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            keepalive_interval_secs: DEFAULT_KEEPALIVE_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            reclaim_empty_sessions: true,
            transform: true,
        }
    }
}

impl RelayConfig {
    /// Keepalive interval as a duration (never zero)
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs.max(1))
    }
}

/// Static file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Directory to serve non-channel paths from (disabled if None)
    pub dir: Option<PathBuf>,
    /// File served for `/` and unresolvable paths inside `dir`
    pub index: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            dir: None,
            index: "webrtc_example.html".into(),
        }
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => {
                debug!("No config directory found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "rendezvous", "rendezvous")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
