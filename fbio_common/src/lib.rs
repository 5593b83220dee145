//! Fieldbus I/O Common Library
//!
//! Shared constants, identifiers and configuration loading for all
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Timing defaults and table limits
//! - [`config`] - Configuration loading traits and types
//! - [`io`] - I/O identifiers, bit helpers, point lists and frame layouts
//! - [`lifecycle`] - Host operation states
//! - [`variant`] - Typed provider values
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! fbio = { package = "fbio_common", path = "../fbio_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use fbio_common::consts::CYCLE_TIME_US;
//! use fbio_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod config;
pub mod consts;
pub mod io;
pub mod lifecycle;
pub mod prelude;
pub mod variant;
