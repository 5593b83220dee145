//! # Fieldbus I/O Runtime
//!
//! Cyclic fieldbus I/O for a PLC-hosted component. A fixed-period RT loop
//! reads the input frame into an I/O registry, evaluates the application
//! logic and writes the output frame. Two slower loops log the registry and
//! poll a process-variable subscription.
//!
//! ## Loops
//!
//! 1. **RT executor** ([`cycle`]): absolute monotonic deadlines, overrun
//!    resync, SCHED_FIFO. Processing is toggled; the clock keeps ticking.
//! 2. **Diagnostic** ([`diagnostic`]): one record per point every 100 ms,
//!    from registry values only.
//! 3. **Subscription** ([`subscription`]): polls correlated
//!    `(name, value)` records and keeps the last known value per name.
//!
//! ## Zero-Allocation RT Path
//!
//! Points, offsets and logic indices are resolved when processing starts.
//! The cycle itself is byte copies and atomic stores; frame locks are
//! try-locks and a contended frame only skips that cycle.

pub mod config;
pub mod cycle;
pub mod device;
pub mod diagnostic;
pub mod error;
pub mod logic;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod sim;
pub mod subscription;

pub use error::RuntimeError;
pub use runtime::{Runtime, Services};
