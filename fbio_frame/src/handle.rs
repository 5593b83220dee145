//! Frame handles and scoped access
//!
//! A [`FrameHandle`] is the ownership token for one leased frame. It
//! resolves variables through the provider and brackets every frame access
//! in a guard, so the matching end always runs on every exit path. A failed
//! begin holds nothing and is reported as [`FrameError::NotReady`].
//!
//! Release is idempotent and also happens on drop.

use std::fmt;
use std::sync::Arc;

use fbio::io::BitLocation;

use crate::buffer::{FrameBuffer, ReadLock, WriteLock};
use crate::error::{FrameError, FrameResult};
use crate::provider::{AccessMode, FrameId, FrameProvider};

/// Leased frame.
pub struct FrameHandle {
    frame: FrameId,
    mode: AccessMode,
    buffer: Option<Arc<FrameBuffer>>,
    provider: Arc<dyn FrameProvider>,
}

impl FrameHandle {
    /// Acquire `frame` from `provider` with the given intent.
    pub fn acquire(
        provider: Arc<dyn FrameProvider>,
        frame: FrameId,
        mode: AccessMode,
    ) -> FrameResult<Self> {
        let buffer = provider.acquire(&frame, mode)?;
        tracing::debug!("Acquired frame {frame} ({mode:?}, {} bytes)", buffer.len());
        Ok(Self {
            frame,
            mode,
            buffer: Some(buffer),
            provider,
        })
    }

    /// Frame id.
    pub fn frame(&self) -> &FrameId {
        &self.frame
    }

    /// Access intent.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// True once released.
    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }

    /// Frame size in bytes.
    pub fn len(&self) -> FrameResult<usize> {
        Ok(self.buffer()?.len())
    }

    /// Resolve a byte-addressed variable.
    pub fn resolve_offset(&self, variable: &str) -> FrameResult<usize> {
        self.buffer()?;
        self.provider.variable_offset(&self.frame, variable)
    }

    /// Resolve a bit-addressed variable.
    pub fn resolve_bit(&self, variable: &str) -> FrameResult<BitLocation> {
        self.buffer()?;
        let (byte_offset, bit_index) = self.provider.variable_bit_offset(&self.frame, variable)?;
        BitLocation::new(byte_offset, bit_index).ok_or_else(|| {
            FrameError::InvalidLayout(format!(
                "{variable}: provider returned bit index {bit_index}"
            ))
        })
    }

    /// Begin a scoped read. The lock ends when the guard drops.
    pub fn read(&self) -> FrameResult<ReadLock<'_>> {
        self.buffer()?
            .begin_read()
            .ok_or(FrameError::NotReady { operation: "read" })
    }

    /// Begin a scoped write. The frame is published when the guard drops.
    pub fn write(&self) -> FrameResult<WriteLock<'_>> {
        if self.mode != AccessMode::Write {
            return Err(FrameError::ReadOnly {
                frame: self.frame.to_string(),
            });
        }
        self.buffer()?
            .begin_write()
            .ok_or(FrameError::NotReady { operation: "write" })
    }

    /// Run `action` on a consistent snapshot of the frame.
    pub fn scoped_read<R>(&self, action: impl FnOnce(&[u8]) -> R) -> FrameResult<R> {
        let view = self.read()?;
        Ok(action(&view))
    }

    /// Run `action` on the frame's back slot and publish it.
    pub fn scoped_write<R>(&self, action: impl FnOnce(&mut [u8]) -> R) -> FrameResult<R> {
        let mut view = self.write()?;
        Ok(action(&mut view))
    }

    /// Return the lease. Returns `false` if it was already returned.
    pub fn release(&mut self) -> bool {
        match self.buffer.take() {
            Some(_) => {
                self.provider.release(&self.frame, self.mode);
                tracing::debug!("Released frame {}", self.frame);
                true
            }
            None => false,
        }
    }

    fn buffer(&self) -> FrameResult<&FrameBuffer> {
        self.buffer.as_deref().ok_or_else(|| FrameError::Released {
            frame: self.frame.to_string(),
        })
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("frame", &self.frame)
            .field("mode", &self.mode)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.release();
    }
}
