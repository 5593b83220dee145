//! Frame provider contract
//!
//! The provider owns the frames and their variable tables. It hands out
//! frame memory on `acquire`, enforces at most one writer per frame, and
//! resolves variable names to offsets. [`crate::FrameHandle`] is the only
//! client-facing wrapper around it.

use std::fmt;
use std::sync::Arc;

use crate::buffer::FrameBuffer;
use crate::error::FrameResult;

/// Name of a frame: the I/O system plus the buffer id on that system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameId {
    /// I/O system id, e.g. `DeviceBus`.
    pub io_system: String,
    /// Buffer id, e.g. `1:IN`.
    pub buffer: String,
}

impl FrameId {
    /// Create a frame id.
    pub fn new(io_system: impl Into<String>, buffer: impl Into<String>) -> Self {
        Self {
            io_system: io_system.into(),
            buffer: buffer.into(),
        }
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.io_system, self.buffer)
    }
}

/// Access intent declared at acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Shared, any number of readers.
    Read,
    /// Exclusive, one writer per frame.
    Write,
}

/// Source of named frames.
pub trait FrameProvider: Send + Sync {
    /// Lease a frame.
    ///
    /// # Errors
    /// `NotFound` for unknown frames, `Busy` when a second writer is requested.
    fn acquire(&self, frame: &FrameId, mode: AccessMode) -> FrameResult<Arc<FrameBuffer>>;

    /// Return a lease obtained from [`FrameProvider::acquire`].
    fn release(&self, frame: &FrameId, mode: AccessMode);

    /// Byte offset of a variable.
    fn variable_offset(&self, frame: &FrameId, variable: &str) -> FrameResult<usize>;

    /// Byte offset and bit index of a bit-addressed variable.
    fn variable_bit_offset(&self, frame: &FrameId, variable: &str) -> FrameResult<(usize, u8)>;
}
