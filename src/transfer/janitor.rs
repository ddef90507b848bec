//! Session Janitor
//!
//! Background worker that evicts finished sessions from the engine.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::engine::TransferEngine;
use crate::config::TransferConfig;

#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// How often to sweep
    pub scan_interval: Duration,
    /// How long a COMPLETED session stays queryable
    pub retention: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            retention: Duration::from_secs(600),
        }
    }
}

impl From<&TransferConfig> for JanitorConfig {
    fn from(config: &TransferConfig) -> Self {
        Self {
            scan_interval: config.janitor_scan_interval(),
            retention: config.session_retention(),
        }
    }
}

pub struct SessionJanitor {
    engine: Arc<TransferEngine>,
    config: JanitorConfig,
}

impl SessionJanitor {
    pub fn new(engine: Arc<TransferEngine>, config: JanitorConfig) -> Self {
        Self { engine, config }
    }

    pub fn with_defaults(engine: Arc<TransferEngine>) -> Self {
        Self::new(engine, JanitorConfig::default())
    }

    /// Sweep forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            "Starting session janitor"
        );

        loop {
            tokio::time::sleep(self.config.scan_interval).await;
            self.sweep();
        }
    }

    /// Run a single eviction pass
    pub fn sweep(&self) -> usize {
        let evicted = self.engine.evict_completed(self.config.retention);
        if evicted > 0 {
            info!(
                count = evicted,
                remaining = self.engine.session_count(),
                "Evicted completed sessions"
            );
        } else {
            debug!("No sessions to evict");
        }
        evicted
    }
}
