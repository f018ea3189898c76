//! Application settings using Figment
//!
//! Settings describe *how* the load generator talks to the agent, as opposed to the
//! per-run [`LoadTestConfig`](crate::config::LoadTestConfig) which describes *what* it
//! sends. They are layered from:
//! 1. Built-in defaults
//! 2. An optional TOML file (`--settings`)
//! 3. Environment variables (prefixed with `DFAGENT_`, e.g. `DFAGENT_LOG_LEVEL=debug`)
//!
//! # Example
//! ```no_run
//! use dfagent_loadtest::settings::AppSettings;
//!
//! let settings = AppSettings::load(None)?;
//! println!("Agent: {}", settings.instance_name);
//! # Ok::<(), figment::Error>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty-printed format with colors (for development)
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation
    Json,
}

/// Top-level application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Name the agent is registered under in the directory service
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// How long the liveness probe may take during session establishment
    #[serde(default = "default_resolve_timeout", with = "humantime_serde")]
    pub resolve_timeout: Duration,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Emit span close events (petition timing)
    #[serde(default)]
    pub log_span_events: bool,
    /// Include source file and line in log lines
    #[serde(default)]
    pub log_source_location: bool,
    /// Source identifier stamped on every submitted frame
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    /// Middleware message size limit in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_instance_name() -> String {
    "DF/MIRADASDFAgent".to_string()
}

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_camera_id() -> String {
    "MIRADAS".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576_000
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            resolve_timeout: default_resolve_timeout(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            log_span_events: false,
            log_source_location: false,
            camera_id: default_camera_id(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl AppSettings {
    /// Load settings from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(AppSettings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("DFAGENT_")).extract()
    }

    /// Validate settings after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.instance_name.trim().is_empty() {
            return Err("instance_name cannot be empty".to_string());
        }

        if self.resolve_timeout.is_zero() {
            return Err("resolve_timeout must be greater than zero".to_string());
        }

        if self.camera_id.is_empty() {
            return Err("camera_id cannot be empty".to_string());
        }

        Ok(())
    }
}
