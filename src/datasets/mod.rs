//! Dataset configuration subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigStore::snapshot()
//!     → within check interval? return held Arc<ConfigSnapshot>
//!     → source reader (raw bytes | SourceError → keep snapshot, warn once)
//!     → fingerprint.rs (sha256 of raw bytes)
//!     → same fingerprint? keep snapshot
//!     → parser.rs (TOML → name → DatasetDefinition)
//!     → ConfigParseError? keep snapshot, log error
//!     → atomic swap of Arc<ConfigSnapshot>
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; readers holding an old one keep a complete value
//! - Any byte change counts as a change (comments and whitespace included)
//! - Only one revalidation runs at a time; concurrent readers take the cheap path

pub mod definition;
pub mod fingerprint;
pub mod parser;
pub mod store;

pub use definition::DatasetDefinition;
pub use fingerprint::Fingerprint;
pub use parser::{parse_definitions, ConfigParseError};
pub use store::{ConfigSnapshot, ConfigStore, Revalidation};
