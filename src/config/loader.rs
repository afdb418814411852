//! Settings loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::Settings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}: {message}")]
    Env {
        key: &'static str,
        value: String,
        message: String,
    },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a settings file without validating it.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Override settings from environment-style variables.
///
/// | Variable | Field |
/// |---|---|
/// | `DATASETS_CONFIG_PATH` | `datasets.config_path` |
/// | `DATASET_CACHE_TTL` | `datasets.cache_ttl_secs` |
/// | `DATASET_CONFIG_CACHE_TTL` | `datasets.config_cache_ttl_secs` |
/// | `REQUIRE_DATASETS` | `datasets.require_datasets` |
/// | `SOURCE_TIMEOUT` | `datasets.source_timeout_secs` |
/// | `DATASET_CACHE_MAX_VARIANTS` | `datasets.max_cached_variants` |
/// | `DATASET_LOADER` | `loaders.implementations` (comma-separated) |
/// | `ENABLE_DATA_GENERATOR` | `loaders.enable_generator` |
/// | `PROCESS_QUERY_PARAMS` | `query.process_query_params` |
/// | `BIND_ADDRESS` | `server.bind_address` |
/// | `LOG_LEVEL` | `observability.log_level` |
pub fn apply_env<F>(settings: &mut Settings, lookup: F) -> Result<(), SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("DATASETS_CONFIG_PATH") {
        settings.datasets.config_path = value;
    }
    if let Some(value) = lookup("DATASET_CACHE_TTL") {
        settings.datasets.cache_ttl_secs = parse_secs("DATASET_CACHE_TTL", value)?;
    }
    if let Some(value) = lookup("DATASET_CONFIG_CACHE_TTL") {
        settings.datasets.config_cache_ttl_secs = parse_secs("DATASET_CONFIG_CACHE_TTL", value)?;
    }
    if let Some(value) = lookup("REQUIRE_DATASETS") {
        settings.datasets.require_datasets = parse_bool("REQUIRE_DATASETS", value)?;
    }
    if let Some(value) = lookup("SOURCE_TIMEOUT") {
        settings.datasets.source_timeout_secs = parse_secs("SOURCE_TIMEOUT", value)?;
    }
    if let Some(value) = lookup("DATASET_CACHE_MAX_VARIANTS") {
        settings.datasets.max_cached_variants = parse_count("DATASET_CACHE_MAX_VARIANTS", value)?;
    }
    if let Some(value) = lookup("DATASET_LOADER") {
        settings.loaders.implementations = value
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(value) = lookup("ENABLE_DATA_GENERATOR") {
        settings.loaders.enable_generator = parse_bool("ENABLE_DATA_GENERATOR", value)?;
    }
    if let Some(value) = lookup("PROCESS_QUERY_PARAMS") {
        settings.query.process_query_params = parse_bool("PROCESS_QUERY_PARAMS", value)?;
    }
    if let Some(value) = lookup("BIND_ADDRESS") {
        settings.server.bind_address = value;
    }
    if let Some(value) = lookup("LOG_LEVEL") {
        settings.observability.log_level = value.to_ascii_lowercase();
    }
    Ok(())
}

/// Load from an optional file, apply the process environment, then validate.
pub fn load(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let mut settings = match path {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}

fn parse_secs(key: &'static str, value: String) -> Result<u64, SettingsError> {
    value.trim().parse::<u64>().map_err(|e| SettingsError::Env {
        key,
        message: e.to_string(),
        value,
    })
}

fn parse_count(key: &'static str, value: String) -> Result<usize, SettingsError> {
    value.trim().parse::<usize>().map_err(|e| SettingsError::Env {
        key,
        message: e.to_string(),
        value,
    })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Env {
            key,
            value,
            message: "expected a boolean".to_string(),
        }),
    }
}
