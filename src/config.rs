//! Configuration system.
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (base configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (SCHEDELAB_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [elaboration]
//! growth_factor = 6
//! verify_resource_groups = true
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SCHEDELAB_ELABORATION__GROWTH_FACTOR=8
//! SCHEDELAB_LOGGING__LEVEL=trace
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub elaboration: ElaborationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tuning knobs for the elaboration engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElaborationConfig {
    /// Multiplier on the original instruction-class count past which
    /// variant inference is treated as runaway (`VariantGrowthLimitExceeded`).
    #[serde(default = "default_growth_factor")]
    pub growth_factor: usize,

    /// Whether `ResourceGroupOverlapNoSupergroup` is checked during
    /// resource collection. Disabling it is only ever useful while
    /// iterating on a target description that hasn't finished declaring
    /// its resource groups yet.
    #[serde(default = "default_true")]
    pub verify_resource_groups: bool,

    /// Whether a completeness failure aborts elaboration (`true`) or is
    /// merely logged as a warning (`false`).
    #[serde(default = "default_true")]
    pub enforce_completeness: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_growth_factor() -> usize {
    6
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (`SCHEDELAB_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("SCHEDELAB_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SCHEDELAB_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            elaboration: ElaborationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ElaborationConfig {
    fn default() -> Self {
        ElaborationConfig {
            growth_factor: default_growth_factor(),
            verify_resource_groups: true,
            enforce_completeness: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
