//! Process settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Local dataset configuration:
//!     watcher.rs detects change
//!     → ConfigStore::expire_check()
//!     → ConfigStore::force_revalidate()
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded
//! - All fields have defaults to allow minimal settings
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{apply_env, load, load_settings, SettingsError};
pub use schema::{
    DatasetsConfig, LoadersConfig, ObservabilityConfig, QueryConfig, ServerConfig, Settings,
};
pub use validation::{validate_settings, ValidationError};
pub use watcher::ConfigWatcher;
