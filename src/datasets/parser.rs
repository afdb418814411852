//! Dataset configuration parsing.
//!
//! # Format
//! ```toml
//! [sales]                      # section header = dataset name
//! label = "**Sales**"          # optional, defaults to the name
//! path = "s3://bucket/sales.csv"
//! index = "ts"
//! aggregations = { amount = "sum" }
//! description = "Daily sales."
//!
//! [sales.loader_kwargs]        # opaque, forwarded to the loader
//! delimiter = ";"
//! ```
//!
//! Unknown section keys are rejected; unknown loader kwargs are not inspected.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::datasets::definition::{DatasetDefinition, AGGREGATIONS};
use crate::loaders::file::FileFormat;

/// The configuration content is unusable. The previous snapshot keeps serving.
#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("configuration is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed configuration: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("section '{section}': {message}")]
    InvalidSection { section: String, message: String },

    #[error("duplicate dataset name '{name}' (sections '{first}' and '{second}')")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    #[error("duplicate dataset label '{label}' (datasets '{first}' and '{second}')")]
    DuplicateLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("section '{section}': unknown aggregation '{function}' for column '{column}'")]
    UnknownAggregation {
        section: String,
        column: String,
        function: String,
    },

    #[error("section '{section}': cannot derive a reader for '{path}': {message}")]
    UnreadablePath {
        section: String,
        path: String,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSection {
    name: Option<String>,
    label: Option<String>,
    path: String,
    index: String,
    #[serde(default)]
    aggregations: BTreeMap<String, String>,
    #[serde(default)]
    description: String,
    loader: Option<String>,
    #[serde(default, alias = "read_function_kwargs")]
    loader_kwargs: toml::Table,
}

/// Parse raw configuration bytes into definitions, in declaration order.
pub fn parse_definitions(raw: &[u8]) -> Result<Vec<Arc<DatasetDefinition>>, ConfigParseError> {
    let text = std::str::from_utf8(raw)?;
    let document: toml::Table = toml::from_str(text)?;

    let mut datasets = Vec::with_capacity(document.len());
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut labels: BTreeMap<String, String> = BTreeMap::new();

    for (section, value) in document {
        let definition = parse_section(&section, value)?;

        if let Some(first) = sections.get(&definition.name) {
            return Err(ConfigParseError::DuplicateName {
                name: definition.name.clone(),
                first: first.clone(),
                second: section,
            });
        }
        if let Some(first) = labels.get(&definition.label) {
            return Err(ConfigParseError::DuplicateLabel {
                label: definition.label.clone(),
                first: first.clone(),
                second: definition.name.clone(),
            });
        }

        sections.insert(definition.name.clone(), section);
        labels.insert(definition.label.clone(), definition.name.clone());
        datasets.push(Arc::new(definition));
    }

    Ok(datasets)
}

fn parse_section(section: &str, value: toml::Value) -> Result<DatasetDefinition, ConfigParseError> {
    let invalid = |message: String| ConfigParseError::InvalidSection {
        section: section.to_string(),
        message,
    };

    if !value.is_table() {
        return Err(invalid("expected a table".to_string()));
    }
    let raw: RawSection = value.try_into().map_err(|e: toml::de::Error| invalid(e.message().to_string()))?;

    let name = raw.name.unwrap_or_else(|| section.to_string());
    for (field, text) in [("name", &name), ("path", &raw.path), ("index", &raw.index)] {
        if text.trim().is_empty() {
            return Err(invalid(format!("field '{}' must not be empty", field)));
        }
    }
    if let Some(loader) = &raw.loader {
        if loader.is_empty() {
            return Err(invalid("field 'loader' must not be empty".to_string()));
        }
    }

    for (column, function) in &raw.aggregations {
        if !AGGREGATIONS.contains(&function.as_str()) {
            return Err(ConfigParseError::UnknownAggregation {
                section: section.to_string(),
                column: column.clone(),
                function: function.clone(),
            });
        }
    }

    // Explicit loaders own their path semantics.
    if raw.loader.is_none() {
        FileFormat::from_path(&raw.path).map_err(|message| ConfigParseError::UnreadablePath {
            section: section.to_string(),
            path: raw.path.clone(),
            message,
        })?;
    }

    Ok(DatasetDefinition {
        label: raw.label.unwrap_or_else(|| name.clone()),
        name,
        source_path: raw.path,
        index_column: raw.index,
        aggregations: raw.aggregations,
        description: raw.description,
        loader: raw.loader,
        loader_kwargs: raw.loader_kwargs,
    })
}
