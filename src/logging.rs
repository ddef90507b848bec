//! Logging
//!
//! File output goes through a rolling, non-blocking appender; text mode also
//! mirrors to stdout. Per-step protocol events use [`PROTOCOL_TARGET`] so they
//! can be silenced with `enable_tracing: false` without touching the level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Target used for per-step protocol tracing
pub const PROTOCOL_TARGET: &str = "cypher_protocol";

/// Install the global subscriber; keep the guard alive until exit
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender = RollingFileAppender::new(
        rotation(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(writer).with_ansi(false))
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}

fn rotation(name: &str) -> Rotation {
    match name {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

fn filter_directive(config: &AppConfig) -> String {
    if config.enable_tracing {
        config.log_level.clone()
    } else {
        format!("{},{}=off", config.log_level, PROTOCOL_TARGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enable_tracing: bool) -> AppConfig {
        AppConfig::from_yaml_str(&format!(
            "log_level: info\nlog_dir: ./logs\nlog_file: t.log\nuse_json: false\nrotation: never\nenable_tracing: {}\n",
            enable_tracing
        ))
        .unwrap()
    }

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("daily"), Rotation::DAILY);
        assert_eq!(rotation("hourly"), Rotation::HOURLY);
        assert_eq!(rotation("weekly"), Rotation::NEVER);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(&config(true)), "info");
        assert_eq!(filter_directive(&config(false)), "info,cypher_protocol=off");
        // directive must be accepted by the subscriber
        assert!(EnvFilter::try_new(filter_directive(&config(false))).is_ok());
    }
}
