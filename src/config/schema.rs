//! Settings schema definitions.
//!
//! This module defines the complete settings structure for the explorer
//! backend. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Dataset configuration source and cache timing.
    pub datasets: DatasetsConfig,

    /// Loader implementations to activate.
    pub loaders: LoadersConfig,

    /// Query parameter handling.
    pub query: QueryConfig,

    /// HTTP surface.
    pub server: ServerConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatasetsConfig {
    /// Dataset configuration TOML; local path or `s3://`, `gs://`, `http(s)://` URI.
    pub config_path: String,

    /// Data cache TTL.
    pub cache_ttl_secs: u64,

    /// How often the configuration source is re-read.
    pub config_cache_ttl_secs: u64,

    /// Refuse to start if the configuration cannot be read, is invalid or is empty.
    pub require_datasets: bool,

    /// Transport timeout for remote sources.
    pub source_timeout_secs: u64,

    /// Watch a local configuration file for changes.
    pub watch_local: bool,

    /// Interval of the background sweep dropping expired cache entries.
    pub sweep_interval_secs: u64,

    /// Parameter variants cached per dataset; the oldest loads are evicted first.
    pub max_cached_variants: usize,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            config_path: "datasets.toml".to_string(),
            cache_ttl_secs: 12 * 60 * 60,
            config_cache_ttl_secs: 30,
            require_datasets: false,
            source_timeout_secs: 30,
            watch_local: true,
            sweep_interval_secs: 10 * 60,
            max_cached_variants: crate::cache::DEFAULT_MAX_VARIANTS,
        }
    }
}

impl DatasetsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn config_check_interval(&self) -> Duration {
        Duration::from_secs(self.config_cache_ttl_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadersConfig {
    /// Implementation identifiers of custom loaders, in registration order.
    pub implementations: Vec<String>,

    /// Register the built-in data generator.
    pub enable_generator: bool,
}

impl Default for LoadersConfig {
    fn default() -> Self {
        Self {
            implementations: Vec::new(),
            enable_generator: true,
        }
    }
}

impl LoadersConfig {
    /// Identifiers to register, generator included when enabled.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.implementations.iter().map(String::as_str).collect();
        if self.enable_generator && !ids.contains(&"generator") {
            ids.push("generator");
        }
        ids
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// When `false`, every query parameter is discarded.
    pub process_query_params: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            process_query_params: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8501").
    pub bind_address: String,

    /// Whole-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8501".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    pub metrics_enabled: bool,
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.datasets.config_path, "datasets.toml");
        assert_eq!(settings.datasets.cache_ttl(), Duration::from_secs(43_200));
        assert_eq!(settings.datasets.config_check_interval(), Duration::from_secs(30));
        assert!(!settings.datasets.require_datasets);
        assert!(settings.query.process_query_params);
        assert_eq!(settings.loaders.ids(), vec!["generator"]);
    }

    #[test]
    fn test_partial_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [datasets]
            config_path = "s3://bucket/datasets.toml"
            require_datasets = true

            [loaders]
            implementations = ["generator", "custom"]
            enable_generator = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.datasets.config_path, "s3://bucket/datasets.toml");
        assert!(settings.datasets.require_datasets);
        assert_eq!(settings.datasets.cache_ttl_secs, 43_200);
        assert_eq!(settings.datasets.max_cached_variants, 32);
        assert_eq!(settings.loaders.ids(), vec!["generator", "custom"]);
        assert_eq!(settings.server, ServerConfig::default());
    }
}
