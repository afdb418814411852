//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → LoaderRegistry → ConfigStore (initial read) → DatasetCache
//!     → background tasks (config watcher, cache sweeper)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, background tasks exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: registry first, then store, then cache, listeners last
//! - Services are passed explicitly; there is no global state

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, start_background_tasks, Services, StartupError};
