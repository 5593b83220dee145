//! System-wide constants for the fieldbus I/O workspace.
//!
//! Single source of truth for timing defaults and table limits.

use static_assertions::const_assert;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Default RT cycle period in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u64 = 1000;

/// Offset past the next full second at which the first cycle is released [ns].
pub const FIRST_CYCLE_OFFSET_NS: u64 = 450_000;

/// Default `SCHED_FIFO` priority of the RT executor thread.
///
/// Sits inside the band of the host's cyclic tasks (67..=82) without
/// sharing a level with them.
pub const DEFAULT_RT_PRIORITY: i32 = 80;

/// Lowest valid `SCHED_FIFO` priority on Linux.
pub const RT_PRIORITY_MIN: i32 = 1;

/// Highest valid `SCHED_FIFO` priority on Linux.
pub const RT_PRIORITY_MAX: i32 = 99;

/// Default diagnostic loop period [ms].
pub const DIAGNOSTIC_PERIOD_MS: u64 = 100;

/// Default subscription poll interval [ms].
pub const SUBSCRIPTION_POLL_MS: u64 = 100;

/// Default subscription sample interval [µs].
pub const SUBSCRIPTION_SAMPLE_US: u64 = 1_000_000;

/// Maximum number of I/O points registered against one frame.
pub const MAX_POINTS_PER_FRAME: usize = 64;

/// Maximum width of a byte-valued I/O point.
pub const MAX_POINT_BYTES: usize = 64;

/// Default fieldbus I/O system identifier.
pub const DEFAULT_IO_SYSTEM: &str = "DeviceBus";

/// Default input buffer id on the I/O system.
pub const DEFAULT_INPUT_BUFFER: &str = "1:IN";

/// Default output buffer id on the I/O system.
pub const DEFAULT_OUTPUT_BUFFER: &str = "1:OUT";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/runtime.toml";

const_assert!(FIRST_CYCLE_OFFSET_NS < NANOS_PER_SEC);
const_assert!(DEFAULT_RT_PRIORITY >= RT_PRIORITY_MIN && DEFAULT_RT_PRIORITY <= RT_PRIORITY_MAX);
const_assert!(CYCLE_TIME_US * 1000 < NANOS_PER_SEC);
