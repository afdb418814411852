//! Pluggable dataset loaders.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     settings.loaders (implementation ids)
//!     → catalog.rs (id → factory → Arc<dyn DatasetLoader>)
//!     → registry.rs (prefix sanity checks, fail fast)
//!     → immutable LoaderRegistry shared via Arc
//!
//! Per lookup:
//!     DatasetDefinition
//!     → registry.resolve() (explicit `loader` prefix, else primary)
//!     → loader.load(definition, params) → Frame
//! ```
//!
//! # Design Decisions
//! - At most one primary (unprefixed) loader; every other prefix is unique,
//!   non-empty and prefix-free with respect to the others
//! - A loader states which of its parameters affect the payload, so the cache
//!   can key on exactly those

pub mod catalog;
pub mod file;
pub mod frame;
pub mod generator;
pub mod registry;

pub use catalog::LoaderCatalog;
pub use file::FileLoader;
pub use frame::Frame;
pub use generator::GeneratorLoader;
pub use registry::{LoaderRegistration, LoaderRegistrationError, LoaderRegistry};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::datasets::DatasetDefinition;
use crate::source::SourceError;

/// Query parameters owned by one loader, prefix stripped.
pub type ParamBucket = BTreeMap<String, String>;

/// A strategy that turns a definition plus parameters into a [`Frame`].
#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Implementation identifier, used in logs and diagnostics.
    fn id(&self) -> &str;

    /// Parameter namespace. `None` marks the primary loader.
    fn prefix(&self) -> Option<String>;

    /// Load the dataset.
    async fn load(
        &self,
        definition: &DatasetDefinition,
        params: &ParamBucket,
    ) -> Result<Frame, LoaderFailure>;

    /// Parameters that change what [`load`](Self::load) returns.
    fn keyed_params(&self, params: &ParamBucket) -> ParamBucket {
        params.clone()
    }
}

/// A loader could not produce a payload.
#[derive(Debug, Clone, Error)]
pub enum LoaderFailure {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("unsupported format: {0}")]
    Format(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("index column '{column}' holds a value that is not a timestamp: {value}")]
    BadTimestamp { column: String, value: String },

    #[error("data must be pre-aggregated: {n_duplicated} of {n_total} rows share an index value")]
    DuplicateIndex {
        n_duplicated: usize,
        n_total: usize,
        samples: Vec<String>,
    },

    #[error("invalid parameter '{key}': {message}")]
    InvalidParameter { key: String, message: String },

    #[error("no loader registered for '{0}'")]
    UnknownLoader(String),
}
