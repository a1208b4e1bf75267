//! Configuration for the route network core.
//!
//! Values are resolved with the following priority:
//! - Environment variables (prefix: `ROUTENET__`)
//! - Configuration file (TOML)
//! - Built-in defaults
//!
//! # Environment Variables
//!
//! - `ROUTENET__LOGGING__LEVEL=debug`
//! - `ROUTENET__LOGGING__JSON=true`
//! - `ROUTENET__TRACE__MAX_HOPS=4096`
//! - `ROUTENET__SEARCH__DEFAULT_MAX_HITS=25`
//! - `ROUTENET__SEARCH__DEFAULT_RADIUS_METERS=2500`
//!
//! # Example
//!
//! ```ignore
//! use route_storage::config::RouteNetworkConfig;
//!
//! let config = RouteNetworkConfig::load(Some("routenet.toml")).unwrap();
//! println!("Trace hop limit: {}", config.trace.max_hops);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteNetworkConfig {
    pub logging: LoggingConfig,
    pub trace: TraceConfig,
    pub search: SearchConfig,
}

impl RouteNetworkConfig {
    /// Loads configuration from an optional file path with environment variable overrides.
    ///
    /// A path that does not exist is treated like no path at all.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(file_path) = path {
            if Path::new(file_path).exists() {
                let contents = std::fs::read_to_string(file_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `ROUTENET__*` overrides looked up through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ROUTENET__LOGGING__LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("ROUTENET__LOGGING__JSON") {
            self.logging.json = parse_flag(&val);
        }

        if let Some(v) = lookup("ROUTENET__TRACE__MAX_HOPS").and_then(|v| v.parse().ok()) {
            self.trace.max_hops = v;
        }
        if let Some(val) = lookup("ROUTENET__TRACE__JUMPER_MARKER") {
            self.trace.jumper_marker = val;
        }
        if let Some(val) = lookup("ROUTENET__TRACE__LOOSE_END_MARKER") {
            self.trace.loose_end_marker = val;
        }

        if let Some(v) = lookup("ROUTENET__SEARCH__DEFAULT_MAX_HITS").and_then(|v| v.parse().ok()) {
            self.search.default_max_hits = v;
        }
        if let Some(v) =
            lookup("ROUTENET__SEARCH__DEFAULT_RADIUS_METERS").and_then(|v| v.parse().ok())
        {
            self.search.default_radius_meters = v;
        }
    }

    /// Serializes the configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Use JSON format for log output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Connectivity trace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Hard cap on traversal steps in each direction.
    pub max_hops: usize,
    /// Connection info shown before an internal patch link.
    pub jumper_marker: String,
    /// Equipment label of an unterminated span segment end.
    pub loose_end_marker: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: 1024,
            jumper_marker: "jumper".to_string(),
            loose_end_marker: "loose end".to_string(),
        }
    }
}

/// Route search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_max_hits: usize,
    pub default_radius_meters: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_hits: 10,
            default_radius_meters: 1000.0,
        }
    }
}
