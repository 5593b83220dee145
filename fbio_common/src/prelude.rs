//! Prelude module for common re-exports.
//!
//! ```rust
//! use fbio_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, Validate};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, MAX_POINTS_PER_FRAME};

// ─── I/O ────────────────────────────────────────────────────────────
pub use crate::io::{BitLocation, Direction, IoPointId, PointConfig, PortName};

// ─── Lifecycle & values ─────────────────────────────────────────────
pub use crate::lifecycle::{LifecycleAction, PlcOperation};
pub use crate::variant::{ValueKind, Variant};

/// Default system cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(CYCLE_TIME_US);
