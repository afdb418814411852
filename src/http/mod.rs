//! HTTP surface for the explorer UI.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, trace span)
//!     → handlers.rs (query resolution → dataset cache → JSON)
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
