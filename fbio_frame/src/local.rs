//! In-process frame provider
//!
//! Serves frames described by [`FrameLayoutConfig`] out of ordinary heap
//! memory. Used by the simulated fieldbus and by tests; a hardware binding
//! implements [`FrameProvider`] the same way over its own frame memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use fbio::io::FrameLayoutConfig;

use crate::buffer::FrameBuffer;
use crate::error::{FrameError, FrameResult};
use crate::provider::{AccessMode, FrameId, FrameProvider};

#[derive(Debug, Clone, Copy)]
struct VariableSlot {
    offset: usize,
    bit: Option<u8>,
}

#[derive(Debug)]
struct LocalFrame {
    buffer: Arc<FrameBuffer>,
    variables: HashMap<String, VariableSlot>,
    writer: AtomicBool,
    readers: AtomicUsize,
}

/// Frame provider backed by process memory.
#[derive(Debug, Default)]
pub struct LocalFrameProvider {
    frames: HashMap<FrameId, LocalFrame>,
}

impl LocalFrameProvider {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider serving every layout in `layouts`.
    pub fn from_layouts(layouts: &[FrameLayoutConfig]) -> FrameResult<Self> {
        let mut provider = Self::new();
        for layout in layouts {
            provider.add_frame(layout)?;
        }
        Ok(provider)
    }

    /// Add one frame. Fails on invalid layouts and duplicate frame ids.
    pub fn add_frame(&mut self, layout: &FrameLayoutConfig) -> FrameResult<()> {
        layout
            .validate()
            .map_err(|e| FrameError::InvalidLayout(e.to_string()))?;

        let id = FrameId::new(&layout.io_system, &layout.buffer);
        if self.frames.contains_key(&id) {
            return Err(FrameError::InvalidLayout(format!("frame {id} defined twice")));
        }

        let variables = layout
            .variables
            .iter()
            .map(|v| {
                (
                    v.name.clone(),
                    VariableSlot {
                        offset: v.offset,
                        bit: v.bit,
                    },
                )
            })
            .collect();

        tracing::debug!(
            "Frame {id}: {} bytes, {} variables",
            layout.size,
            layout.variables.len()
        );
        self.frames.insert(
            id,
            LocalFrame {
                buffer: Arc::new(FrameBuffer::new(layout.size)),
                variables,
                writer: AtomicBool::new(false),
                readers: AtomicUsize::new(0),
            },
        );
        Ok(())
    }

    /// Direct access to a frame's memory, bypassing leases.
    ///
    /// Used by the bus side of a simulation and to inject faults
    /// (see [`FrameBuffer::set_online`]).
    pub fn buffer(&self, frame: &FrameId) -> Option<Arc<FrameBuffer>> {
        self.frames.get(frame).map(|f| Arc::clone(&f.buffer))
    }

    /// Outstanding `(readers, writer)` leases on a frame.
    pub fn leases(&self, frame: &FrameId) -> Option<(usize, bool)> {
        self.frames.get(frame).map(|f| {
            (
                f.readers.load(Ordering::Acquire),
                f.writer.load(Ordering::Acquire),
            )
        })
    }

    fn frame(&self, id: &FrameId) -> FrameResult<&LocalFrame> {
        self.frames.get(id).ok_or_else(|| FrameError::NotFound {
            frame: id.to_string(),
        })
    }

    fn slot(&self, id: &FrameId, variable: &str) -> FrameResult<VariableSlot> {
        self.frame(id)?
            .variables
            .get(variable)
            .copied()
            .ok_or_else(|| FrameError::UnknownVariable {
                frame: id.to_string(),
                variable: variable.to_string(),
            })
    }
}

impl FrameProvider for LocalFrameProvider {
    fn acquire(&self, id: &FrameId, mode: AccessMode) -> FrameResult<Arc<FrameBuffer>> {
        let frame = self.frame(id)?;
        match mode {
            AccessMode::Read => {
                frame.readers.fetch_add(1, Ordering::AcqRel);
            }
            AccessMode::Write => {
                if frame.writer.swap(true, Ordering::AcqRel) {
                    return Err(FrameError::Busy {
                        frame: id.to_string(),
                    });
                }
            }
        }
        Ok(Arc::clone(&frame.buffer))
    }

    fn release(&self, id: &FrameId, mode: AccessMode) {
        let Some(frame) = self.frames.get(id) else {
            tracing::warn!("Release of unknown frame {id}");
            return;
        };
        match mode {
            AccessMode::Read => {
                let _ = frame
                    .readers
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            }
            AccessMode::Write => frame.writer.store(false, Ordering::Release),
        }
    }

    fn variable_offset(&self, id: &FrameId, variable: &str) -> FrameResult<usize> {
        Ok(self.slot(id, variable)?.offset)
    }

    fn variable_bit_offset(&self, id: &FrameId, variable: &str) -> FrameResult<(usize, u8)> {
        let slot = self.slot(id, variable)?;
        slot.bit
            .map(|bit| (slot.offset, bit))
            .ok_or_else(|| FrameError::NotBitAddressable {
                frame: id.to_string(),
                variable: variable.to_string(),
            })
    }
}
