//! Error types for frame buffer operations

use thiserror::Error;

/// Errors that can occur while acquiring, resolving or locking a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// No frame with this id is served by the provider
    #[error("Frame not found: {frame}")]
    NotFound {
        /// Frame id
        frame: String,
    },

    /// A writer lease on the frame is already outstanding
    #[error("Frame busy: {frame} already has a writer")]
    Busy {
        /// Frame id
        frame: String,
    },

    /// Variable name unknown to the frame's layout table
    #[error("Unknown variable {variable} in frame {frame}")]
    UnknownVariable {
        /// Frame id
        frame: String,
        /// Requested variable
        variable: String,
    },

    /// Bit offset requested for a byte-addressed variable
    #[error("Variable {variable} in frame {frame} is not bit-addressable")]
    NotBitAddressable {
        /// Frame id
        frame: String,
        /// Requested variable
        variable: String,
    },

    /// Begin of a scoped read/write failed; the frame data is not valid yet.
    ///
    /// Raised on the cyclic path, so it carries no frame name. Callers
    /// that log it name the frame from the handle.
    #[error("Frame not ready for {operation}")]
    NotReady {
        /// `read` or `write`
        operation: &'static str,
    },

    /// Write attempted through a read-intent handle
    #[error("Frame {frame} was acquired read-only")]
    ReadOnly {
        /// Frame id
        frame: String,
    },

    /// Handle used after release
    #[error("Frame handle for {frame} already released")]
    Released {
        /// Frame id
        frame: String,
    },

    /// Provider layout is inconsistent
    #[error("Invalid frame layout: {0}")]
    InvalidLayout(String),
}

impl FrameError {
    /// Failures that clear up on their own; the cycle skips and retries next period.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

/// Result type for frame operations
pub type FrameResult<T> = Result<T, FrameError>;
