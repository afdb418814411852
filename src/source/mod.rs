//! Raw content sources.
//!
//! # Data Flow
//! ```text
//! "local:///etc/datasets.toml" | "s3://bucket/datasets.toml" | "./datasets.toml"
//!     → location.rs (scheme → Local(path) | Remote(url))
//!     → reader.rs (tokio::fs or reqwest, typed SourceError)
//!     → raw bytes to the fingerprinter / loaders
//!
//! Repeated failures:
//!     warnings.rs latches the last failure message so the same
//!     warning is logged once until the condition changes or clears
//! ```
//!
//! # Design Decisions
//! - Every failure is a `SourceError`; nothing else crosses this boundary
//! - Stuck remote fetches are bounded by the HTTP client timeout
//! - Object-storage schemes map onto their public HTTPS endpoints

pub mod location;
pub mod reader;
pub mod warnings;

pub use location::SourceLocation;
pub use reader::{ReadSource, SourceReader};
pub use warnings::WarnLatch;

use thiserror::Error;

/// A source could not be read.
///
/// All variants are soft failures for the config store: the last good
/// snapshot keeps serving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("permission denied reading {0}")]
    PermissionDenied(String),

    #[error("timed out reading {0}")]
    Timeout(String),

    #[error("{location} answered with HTTP {status}")]
    Status { location: String, status: u16 },

    #[error("transport error reading {location}: {message}")]
    Transport { location: String, message: String },

    #[error("unsupported source scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid source path '{path}': {message}")]
    InvalidPath { path: String, message: String },
}
