//! Query parameter routing.
//!
//! # Data Flow
//! ```text
//! raw query params
//!     → resolver.rs (`<prefix>_<key>` → loader bucket, widget names → primary,
//!       everything else discarded with one warning per key)
//!     → ResolvedParameters
//!     → defaults.rs (primary bucket → typed WidgetDefaults)
//! ```

pub mod defaults;
pub mod resolver;

pub use defaults::{
    convert_timestamps, normalize_label, DataSelection, ExpandLimits, QueryValueError,
    WidgetDefaults,
};
pub use resolver::{rejected, resolve_params, resolve_with_prefixes, ResolvedParameters, WIDGET_PARAMETERS};
