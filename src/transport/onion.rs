//! Onion Service Probe
//!
//! The onion router runs out of process. It drops a `*.started` marker file
//! under its state directory once it has bootstrapped; the client only looks
//! for that marker.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::OnionConfig;

const STARTED_EXTENSION: &str = "started";

#[derive(Debug, Clone)]
pub struct OnionServiceClient {
    enabled: bool,
    socks_host: String,
    socks_port: u16,
    state_dir: PathBuf,
}

impl OnionServiceClient {
    pub fn new(config: &OnionConfig) -> Self {
        Self {
            enabled: config.enabled,
            socks_host: config.socks_host.clone(),
            socks_port: config.socks_port,
            state_dir: PathBuf::from(&config.state_dir),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// `host:port` of the SOCKS proxy
    pub fn socks_addr(&self) -> String {
        format!("{}:{}", self.socks_host, self.socks_port)
    }

    /// True when a `*.started` marker exists anywhere under the state dir
    pub fn is_tor_running(&self) -> bool {
        let found = has_started_marker(&self.state_dir);
        debug!(state_dir = %self.state_dir.display(), found, "Onion marker probe");
        found
    }

    /// Reachable when routing is disabled, or enabled and running
    pub fn is_reachable(&self) -> bool {
        !self.enabled || self.is_tor_running()
    }
}

fn has_started_marker(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if has_started_marker(&path) {
                return true;
            }
        } else if path.extension().is_some_and(|ext| ext == STARTED_EXTENSION) {
            return true;
        }
    }
    false
}
