//! Tabular payloads with a timestamp index.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::loaders::LoaderFailure;

/// Number of duplicated index values kept as samples in errors.
const DUPLICATE_SAMPLES: usize = 5;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// One named column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// A loaded dataset: unique timestamps plus value columns of equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    index_name: String,
    index: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame, rejecting ragged columns and duplicate timestamps.
    pub fn new(
        index_name: impl Into<String>,
        index: Vec<NaiveDateTime>,
        columns: Vec<Column>,
    ) -> Result<Self, LoaderFailure> {
        if let Some(column) = columns.iter().find(|c| c.values.len() != index.len()) {
            return Err(LoaderFailure::Malformed(format!(
                "column '{}' has {} values, index has {}",
                column.name,
                column.values.len(),
                index.len()
            )));
        }
        check_unique(&index)?;

        Ok(Self {
            index_name: index_name.into(),
            index,
            columns,
        })
    }

    /// Build a frame from row records, moving `index_column` into the index.
    pub fn from_records(
        index_column: &str,
        headers: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, LoaderFailure> {
        let position = headers
            .iter()
            .position(|h| h == index_column)
            .ok_or_else(|| LoaderFailure::MissingColumn(index_column.to_string()))?;

        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();
        let width = columns.len();

        for (line, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(LoaderFailure::Malformed(format!(
                    "row {} has {} fields, expected {}",
                    line + 1,
                    row.len(),
                    width
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }

        let index_values = columns.remove(position).values;
        let index = index_values
            .iter()
            .map(|value| {
                parse_timestamp(value).ok_or_else(|| LoaderFailure::BadTimestamp {
                    column: index_column.to_string(),
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(index_column, index, columns)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Earliest and latest timestamp.
    pub fn limits(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.index.iter().min()?;
        let max = self.index.iter().max()?;
        Some((*min, *max))
    }

    /// Fail on the first name that is not a column.
    pub fn require_columns<'a>(
        &self,
        names: impl IntoIterator<Item = &'a String>,
    ) -> Result<(), LoaderFailure> {
        for name in names {
            if self.column(name).is_none() {
                return Err(LoaderFailure::MissingColumn(name.clone()));
            }
        }
        Ok(())
    }
}

/// Parse a timestamp cell: RFC 3339, common ISO-like layouts, plain dates or
/// integer UNIX seconds.
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn check_unique(index: &[NaiveDateTime]) -> Result<(), LoaderFailure> {
    let mut counts: HashMap<NaiveDateTime, usize> = HashMap::with_capacity(index.len());
    for ts in index {
        *counts.entry(*ts).or_default() += 1;
    }
    if counts.len() == index.len() {
        return Ok(());
    }

    let mut duplicated: Vec<(NaiveDateTime, usize)> =
        counts.into_iter().filter(|(_, n)| *n > 1).collect();
    duplicated.sort_by(|a, b| b.0.cmp(&a.0));

    Err(LoaderFailure::DuplicateIndex {
        n_duplicated: duplicated.iter().map(|(_, n)| n).sum(),
        n_total: index.len(),
        samples: duplicated
            .iter()
            .take(DUPLICATE_SAMPLES)
            .map(|(ts, _)| ts.to_string())
            .collect(),
    })
}
