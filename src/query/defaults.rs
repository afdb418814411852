//! Typed widget defaults recovered from the primary parameter bucket.

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::loaders::ParamBucket;

/// Smallest UNIX timestamp accepted in a `data` range (1990-01-01).
pub const MIN_RANGE_TIMESTAMP: i64 = 631_152_000;

const ROUND_SECONDS: i64 = 300;

/// A widget parameter could not be converted. Never fatal; the widget falls
/// back to its own default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for '{key}': {message}")]
pub struct QueryValueError {
    pub key: String,
    pub value: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExpandLimits {
    Enabled(bool),
    Custom(String),
}

/// What the `data` parameter selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DataSelection {
    /// Opaque parameters for a custom loader (`0x`-prefixed hex).
    Bytes(Vec<u8>),
    /// A generated range, naive UTC.
    Range {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// Position in the dataset list.
    Index(usize),
    /// A dataset label; compare with [`normalize_label`].
    Label(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WidgetDefaults {
    pub schedule: Option<String>,
    pub step: Option<i64>,
    pub n_splits: Option<i64>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub expand_limits: Option<ExpandLimits>,
    pub show_removed: Option<bool>,
    pub data: Option<DataSelection>,
}

impl WidgetDefaults {
    /// Convert what can be converted; report the rest.
    pub fn from_bucket(bucket: &ParamBucket) -> (Self, Vec<QueryValueError>) {
        let mut defaults = Self::default();
        let mut errors = Vec::new();

        for (key, value) in bucket {
            let error = |message: &str| QueryValueError {
                key: key.clone(),
                value: value.clone(),
                message: message.to_string(),
            };

            match key.as_str() {
                "schedule" => defaults.schedule = Some(value.clone()),
                "before" => defaults.before = Some(value.clone()),
                "after" => defaults.after = Some(value.clone()),
                "step" | "n_splits" => match value.trim().parse::<i64>() {
                    Ok(n) if key == "step" => defaults.step = Some(n),
                    Ok(n) => defaults.n_splits = Some(n),
                    Err(_) => errors.push(error("expected an integer")),
                },
                "show_removed" => match parse_bool(value) {
                    Some(b) => defaults.show_removed = Some(b),
                    None => errors.push(error("expected 1, 0, true or false")),
                },
                "expand_limits" => {
                    defaults.expand_limits = Some(match parse_bool(value) {
                        Some(b) => ExpandLimits::Enabled(b),
                        None if value.eq_ignore_ascii_case("auto") => ExpandLimits::Enabled(true),
                        None => ExpandLimits::Custom(value.clone()),
                    })
                }
                "data" => match parse_data(value) {
                    Ok(selection) => defaults.data = Some(selection),
                    Err(message) => errors.push(error(&message)),
                },
                _ => {}
            }
        }

        (defaults, errors)
    }
}

/// Strip Markdown bold/monospace markers and spaces, then lowercase.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '*' | '`' | ' '))
        .collect::<String>()
        .to_lowercase()
}

/// Convert two UNIX timestamps to naive UTC, each rounded to the nearest
/// five minutes (ties to even).
pub fn convert_timestamps(start: i64, end: i64) -> Option<(NaiveDateTime, NaiveDateTime)> {
    Some((round_timestamp(start)?, round_timestamp(end)?))
}

fn round_timestamp(ts: i64) -> Option<NaiveDateTime> {
    let within_hour = ts.rem_euclid(3600);
    let (mut steps, remainder) = (within_hour / ROUND_SECONDS, within_hour % ROUND_SECONDS);
    let half = ROUND_SECONDS / 2;
    if remainder > half || (remainder == half && steps % 2 == 1) {
        steps += 1;
    }
    let rounded = ts - within_hour + steps * ROUND_SECONDS;
    DateTime::from_timestamp(rounded, 0).map(|dt| dt.naive_utc())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_data(value: &str) -> Result<DataSelection, String> {
    if let Some(digits) = value.strip_prefix("0x") {
        return hex::decode(digits)
            .map(DataSelection::Bytes)
            .map_err(|e| e.to_string());
    }
    if let Some((start, end)) = parse_range(value) {
        return convert_timestamps(start, end)
            .map(|(start, end)| DataSelection::Range { start, end })
            .ok_or_else(|| "timestamp out of range".to_string());
    }
    if let Ok(index) = value.parse::<usize>() {
        return Ok(DataSelection::Index(index));
    }
    Ok(DataSelection::Label(value.to_string()))
}

fn parse_range(value: &str) -> Option<(i64, i64)> {
    if value.matches('-').count() != 1 {
        return None;
    }
    let (left, right) = value.split_once('-')?;
    let start = left.trim().parse::<i64>().ok()?;
    let end = right.trim().parse::<i64>().ok()?;
    (start >= MIN_RANGE_TIMESTAMP && end >= MIN_RANGE_TIMESTAMP).then_some((start, end))
}
