//! Declared datasets.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::datasets::Fingerprint;

/// Aggregation functions a dataset may declare for its columns.
pub const AGGREGATIONS: &[&str] = &[
    "sum", "mean", "median", "min", "max", "count", "first", "last", "std", "var", "nunique",
];

/// One declared dataset, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDefinition {
    /// Unique key; the section header unless overridden.
    pub name: String,

    /// Display name (Markdown). Defaults to `name`.
    pub label: String,

    /// Local or remote URI of the data.
    pub source_path: String,

    /// Datetime-like column used as the index.
    pub index_column: String,

    /// Column name → aggregation function name.
    pub aggregations: BTreeMap<String, String>,

    /// Markdown; the first line is the summary.
    pub description: String,

    /// Prefix of the loader that must load this dataset. `None` selects the
    /// primary loader.
    pub loader: Option<String>,

    /// Passed verbatim to the loader.
    pub loader_kwargs: toml::Table,
}

impl DatasetDefinition {
    /// Minimal definition for the primary loader.
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<String>,
        index_column: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            source_path: source_path.into(),
            index_column: index_column.into(),
            aggregations: BTreeMap::new(),
            description: String::new(),
            loader: None,
            loader_kwargs: toml::Table::new(),
        }
    }

    /// First line of the description.
    pub fn summary(&self) -> &str {
        self.description.lines().next().unwrap_or("").trim()
    }

    /// Digest of every field. `loader_kwargs` keeps its declaration order, so
    /// reordering keys counts as an edit.
    pub fn fingerprint(&self) -> Fingerprint {
        let encoded = serde_json::to_vec(self).unwrap_or_else(|_| format!("{:?}", self).into_bytes());
        Fingerprint::of(&encoded)
    }
}
