//! # Fieldbus Frame Access
//!
//! Named fieldbus frames ("1:IN", "1:OUT" on an I/O system) served by a
//! [`FrameProvider`] and accessed through a [`FrameHandle`].
//!
//! ## Access model
//!
//! - One writer and any number of readers per frame, enforced at acquisition
//! - Every access is bracketed: a begin hands out a guard and the matching
//!   end runs when it drops, on every exit path
//! - A failed begin holds nothing and surfaces as
//!   [`FrameError::NotReady`]; the cyclic caller skips that cycle
//! - Frames are double buffered, so readers always see a complete commit
//!
//! ```text
//! ┌──────────────┐  acquire   ┌──────────────────┐
//! │ FrameHandle  ├───────────►│  FrameProvider   │
//! │ scoped_read  │            │  FrameBuffer     │
//! │ scoped_write │◄───────────┤  variable table  │
//! └──────────────┘  Arc<buf>  └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use fbio_frame::{AccessMode, FrameHandle, FrameId, LocalFrameProvider};
//!
//! let layouts = fbio::io::config::sample_layouts("DeviceBus", "1:IN", "1:OUT");
//! let provider = Arc::new(LocalFrameProvider::from_layouts(&layouts).unwrap());
//!
//! let out = FrameHandle::acquire(provider, FrameId::new("DeviceBus", "1:OUT"), AccessMode::Write).unwrap();
//! let bit = out.resolve_bit("DeviceBus/0.OUT05").unwrap();
//! out.scoped_write(|frame| frame[bit.byte_offset] |= bit.mask()).unwrap();
//! ```

#![deny(missing_docs)]

pub mod buffer;
pub mod error;
pub mod handle;
pub mod local;
pub mod provider;
pub mod version;

pub use buffer::{FrameBuffer, ReadLock, WriteLock};
pub use error::{FrameError, FrameResult};
pub use handle::FrameHandle;
pub use local::LocalFrameProvider;
pub use provider::{AccessMode, FrameId, FrameProvider};
