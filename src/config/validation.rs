//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::Settings;
use crate::source::SourceLocation;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: String| errors.push(ValidationError { field, message });

    if let Err(e) = SourceLocation::parse(&settings.datasets.config_path) {
        fail("datasets.config_path", e.to_string());
    }
    if settings.datasets.source_timeout_secs == 0 {
        fail("datasets.source_timeout_secs", "must be greater than zero".to_string());
    }
    if settings.datasets.sweep_interval_secs == 0 {
        fail("datasets.sweep_interval_secs", "must be greater than zero".to_string());
    }
    if settings.datasets.max_cached_variants == 0 {
        fail("datasets.max_cached_variants", "must be greater than zero".to_string());
    }

    for id in &settings.loaders.implementations {
        if id.trim().is_empty() {
            fail("loaders.implementations", "identifiers must not be blank".to_string());
        }
    }

    if settings.server.bind_address.parse::<SocketAddr>().is_err() {
        fail(
            "server.bind_address",
            format!("'{}' is not a socket address", settings.server.bind_address),
        );
    }
    if settings.server.request_timeout_secs == 0 {
        fail("server.request_timeout_secs", "must be greater than zero".to_string());
    }

    let level = settings.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(
            "observability.log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        );
    }
    if settings.observability.metrics_enabled
        && settings.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        fail(
            "observability.metrics_address",
            format!("'{}' is not a socket address", settings.observability.metrics_address),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
