//! Dataset configuration and caching for the time fold explorer.

pub mod cache;
pub mod config;
pub mod datasets;
pub mod http;
pub mod lifecycle;
pub mod loaders;
pub mod observability;
pub mod query;
pub mod source;

pub use cache::{DatasetCache, LoadError};
pub use config::Settings;
pub use datasets::{ConfigSnapshot, ConfigStore, DatasetDefinition, Fingerprint};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use loaders::{DatasetLoader, Frame, LoaderRegistry};
pub use query::ResolvedParameters;
