//! Structured logging for the route network core.
//!
//! Projection, split repair and tracing report through `tracing`; the
//! `ROUTENET_LOG` environment variable takes precedence over the configured
//! level.
//!
//! - `ROUTENET_LOG=info` - commits, seed summaries, repair failures
//! - `ROUTENET_LOG=debug` - also ignored duplicates and degraded trace fields
//! - `ROUTENET_LOG=warn,route_storage::split=debug` - per-module filters
//!
//! ```ignore
//! route_storage::logging::init_from_config(&config.logging);
//! ```

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

const ENV_VAR: &str = "ROUTENET_LOG";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Compact human-readable output at `info`. Repeated calls are no-ops.
pub fn init() {
    init_with_default("info");
}

pub fn init_with_default(default_level: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .compact()
        .try_init();
}

/// One JSON object per event, for log shippers.
pub fn init_json() {
    init_json_with_default("info");
}

fn init_json_with_default(default_level: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .json()
        .try_init();
}

/// Picks the format and default level from the `[logging]` section.
pub fn init_from_config(config: &LoggingConfig) {
    if config.json {
        init_json_with_default(&config.level);
    } else {
        init_with_default(&config.level);
    }
}
