//! Fieldbus I/O types shared by the frame provider and the runtime.
//!
//! - [`id`] - frame variable and process-variable identifiers
//! - [`bits`] - bit-packed boolean helpers
//! - [`config`] - point lists and frame layouts

pub mod bits;
pub mod config;
pub mod id;

pub use bits::{BitLocation, read_bit, write_bit};
pub use config::{Direction, FrameLayoutConfig, IoConfig, PointConfig, ProbeConfig, VariableLayoutConfig};
pub use id::{IdError, IoPointId, PortName};
