//! Synthetic data loader.
//!
//! Produces a single `dummy` column, `1 + sin(f * x)`, over an evenly spaced
//! index. `f` is a seeded random walk, so equal parameters give equal frames.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::datasets::DatasetDefinition;
use crate::loaders::frame::{parse_timestamp_str, Column};
use crate::loaders::{DatasetLoader, Frame, LoaderFailure, ParamBucket};

const PARAMS: &[&str] = &["start", "end", "periods", "seed"];
const DEFAULT_PERIODS: usize = 999;
const MAX_PERIODS: usize = 9999;

/// Built-in loader under the `gen` prefix.
#[derive(Debug, Default)]
pub struct GeneratorLoader;

impl GeneratorLoader {
    pub const ID: &'static str = "generator";
    pub const PREFIX: &'static str = "gen";

    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GeneratorParams {
    start: NaiveDateTime,
    end: NaiveDateTime,
    periods: usize,
    seed: u64,
}

impl GeneratorParams {
    /// Query values win over `loader_kwargs`.
    fn resolve(params: &ParamBucket, kwargs: &toml::Table) -> Result<Self, LoaderFailure> {
        let lookup = |key: &str| -> Option<String> {
            params.get(key).cloned().or_else(|| {
                kwargs.get(key).map(|value| match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
        };

        let start = match lookup("start") {
            Some(raw) => timestamp("start", &raw)?,
            None => default_start(),
        };
        let end = match lookup("end") {
            Some(raw) => timestamp("end", &raw)?,
            None => default_end(),
        };
        let periods = match lookup("periods") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_PERIODS).contains(n))
                .ok_or_else(|| invalid("periods", format!("expected 1..={}, got '{}'", MAX_PERIODS, raw)))?,
            None => DEFAULT_PERIODS,
        };
        let seed = match lookup("seed") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid("seed", format!("expected an unsigned integer, got '{}'", raw)))?,
            None => periods as u64,
        };

        if periods > 1 && end <= start {
            return Err(invalid("end", format!("must be after start ({})", start)));
        }

        Ok(Self {
            start,
            end,
            periods,
            seed,
        })
    }

    fn index(&self) -> Vec<NaiveDateTime> {
        if self.periods == 1 {
            return vec![self.start];
        }
        let span = (self.end - self.start).num_milliseconds();
        let last = (self.periods - 1) as i64;
        (0..self.periods as i64)
            .map(|i| self.start + Duration::milliseconds(span * i / last))
            .collect()
    }

    fn values(&self) -> Vec<Value> {
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let stop = self.periods as f64 / 10.0;
        let step = if self.periods > 1 {
            stop / (self.periods - 1) as f64
        } else {
            0.0
        };

        let mut f = 0.0;
        (0..self.periods)
            .map(|i| {
                f += rng.f64();
                let x = step * i as f64;
                Value::from(1.0 + (f * x).sin())
            })
            .collect()
    }
}

#[async_trait]
impl DatasetLoader for GeneratorLoader {
    fn id(&self) -> &str {
        Self::ID
    }

    fn prefix(&self) -> Option<String> {
        Some(Self::PREFIX.to_string())
    }

    async fn load(
        &self,
        definition: &DatasetDefinition,
        params: &ParamBucket,
    ) -> Result<Frame, LoaderFailure> {
        let resolved = GeneratorParams::resolve(params, &definition.loader_kwargs)?;
        tracing::debug!(
            dataset = %definition.name,
            periods = resolved.periods,
            seed = resolved.seed,
            "Generating synthetic dataset"
        );

        let frame = Frame::new(
            definition.index_column.clone(),
            resolved.index(),
            vec![Column {
                name: "dummy".to_string(),
                values: resolved.values(),
            }],
        )?;
        frame.require_columns(definition.aggregations.keys())?;
        Ok(frame)
    }

    fn keyed_params(&self, params: &ParamBucket) -> ParamBucket {
        params
            .iter()
            .filter(|(key, _)| PARAMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn timestamp(key: &str, raw: &str) -> Result<NaiveDateTime, LoaderFailure> {
    parse_timestamp_str(raw).ok_or_else(|| invalid(key, format!("not a timestamp: '{}'", raw)))
}

fn invalid(key: &str, message: String) -> LoaderFailure {
    LoaderFailure::InvalidParameter {
        key: key.to_string(),
        message,
    }
}

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 4, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn default_end() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 5, 11)
        .and_then(|d| d.and_hms_opt(20, 30, 0))
        .unwrap_or_default()
}
