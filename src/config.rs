use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    #[serde(default)]
    pub onion: OnionConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Onion routing section
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OnionConfig {
    pub enabled: bool,
    pub socks_host: String,
    pub socks_port: u16,
    pub control_host: String,
    pub control_port: u16,
    pub hidden_service_port: u16,
    /// Directory scanned for the `*.started` marker
    pub state_dir: String,
}

impl Default for OnionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            socks_host: "127.0.0.1".to_string(),
            socks_port: 9050,
            control_host: "127.0.0.1".to_string(),
            control_port: 9051,
            hidden_service_port: 7946,
            state_dir: "./data/tor".to_string(),
        }
    }
}

/// Transfer engine section
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TransferConfig {
    pub dispatch_timeout_ms: u64,
    pub channel_buffer: usize,
    pub janitor_scan_interval_secs: u64,
    /// How long a completed session stays queryable
    pub session_retention_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: 5_000,
            channel_buffer: 64,
            janitor_scan_interval_secs: 30,
            session_retention_secs: 600,
        }
    }
}

impl TransferConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn janitor_scan_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_scan_interval_secs)
    }

    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_secs)
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
