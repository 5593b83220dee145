//! Processing session: leased frames, registry and bound logic.
//!
//! A [`Session`] exists from start to stop of processing. It lives in
//! [`SharedSession`] behind an `RwLock`:
//!
//! - the RT cycle only `try_read`s it and skips the cycle on contention
//! - stop takes the write lock, so it waits for an in-flight cycle before
//!   the frame handles are released
//! - observers take short read locks; point values are atomics, so they
//!   never block the cycle

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fbio::io::{IoConfig, ProbeConfig};
use fbio_frame::{AccessMode, FrameHandle, FrameId, FrameProvider};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cycle::{CycleCounters, should_log};
use crate::error::RuntimeError;
use crate::logic::{BoundLogic, CycleLogic};
use crate::registry::IoRegistry;

/// Frames, points and logic of one processing run.
pub struct Session {
    input: FrameHandle,
    output: FrameHandle,
    registry: IoRegistry,
    logic: Box<dyn BoundLogic>,
}

impl Session {
    /// Acquire both frames, register the configured points and bind `logic`.
    ///
    /// # Errors
    /// Frame acquisition or logic binding. Points that fail to resolve are
    /// logged and left out; they do not fail the session.
    pub fn open(
        frames: Arc<dyn FrameProvider>,
        io: &IoConfig,
        logic: &dyn CycleLogic,
    ) -> Result<Self, RuntimeError> {
        let input = FrameHandle::acquire(
            frames.clone(),
            FrameId::new(&io.io_system, &io.input_buffer),
            AccessMode::Read,
        )?;
        let output = FrameHandle::acquire(
            frames,
            FrameId::new(&io.io_system, &io.output_buffer),
            AccessMode::Write,
        )?;
        let registry = IoRegistry::build(io, &input, &output);
        let logic = logic.bind(&registry)?;
        Ok(Self {
            input,
            output,
            registry,
            logic,
        })
    }

    /// Read inputs, evaluate, write outputs.
    ///
    /// A frame that cannot be locked keeps its points at their previous
    /// values for this cycle.
    #[inline]
    pub fn run_cycle(&self, counters: &CycleCounters) {
        let registry = &self.registry;

        if let Err(e) = self.input.scoped_read(|frame| registry.inputs.read_all(frame)) {
            let count = counters.record_read_failure();
            if should_log(count) {
                warn!("Input {} read skipped ({count}): {e}", self.input.frame());
            }
        }

        self.logic.evaluate(&registry.inputs, &registry.outputs);

        if let Err(e) = self.output.scoped_write(|frame| registry.outputs.write_all(frame)) {
            let count = counters.record_write_failure();
            if should_log(count) {
                warn!("Output {} write skipped ({count}): {e}", self.output.frame());
            }
        }

        counters.record_processed();
    }

    /// Registered points.
    pub fn registry(&self) -> &IoRegistry {
        &self.registry
    }

    /// Clear the registry and release both frames.
    pub fn close(mut self) {
        let points = self.registry.len();
        self.registry.clear();
        self.input.release();
        self.output.release();
        info!("Session closed ({points} points released)");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("points", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Session slot shared by the RT thread, the diagnostic loop and the
/// lifecycle context.
#[derive(Debug, Default)]
pub struct SharedSession {
    processing: AtomicBool,
    session: RwLock<Option<Session>>,
    counters: CycleCounters,
}

impl SharedSession {
    /// Empty, not processing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cycle counters.
    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    /// True between [`Self::install`] and [`Self::take`].
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Publish `session` and enable processing.
    ///
    /// A session still installed is closed first.
    pub fn install(&self, session: Session) {
        let previous = self.session.write().replace(session);
        if let Some(previous) = previous {
            warn!("Replacing a session that was never stopped");
            previous.close();
        }
        self.processing.store(true, Ordering::Release);
    }

    /// Disable processing and remove the session.
    ///
    /// Blocks until an in-flight cycle has finished with it.
    pub fn take(&self) -> Option<Session> {
        self.processing.store(false, Ordering::Release);
        self.session.write().take()
    }

    /// Run one cycle on the installed session, if processing.
    ///
    /// The lock is only contended while [`Self::install`] replaces a live
    /// session; that cycle is counted as skipped. [`Self::take`] clears
    /// the processing flag first, so cycles starting during a stop return
    /// without touching the lock.
    #[inline]
    pub fn run_cycle(&self) {
        if !self.is_processing() {
            return;
        }
        match self.session.try_read() {
            Some(guard) => {
                if let Some(session) = guard.as_ref() {
                    session.run_cycle(&self.counters);
                }
            }
            None => {
                let count = self.counters.record_skipped();
                if should_log(count) {
                    debug!("Cycle skipped during session change ({count})");
                }
            }
        }
    }

    /// Call `f` with the installed session.
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.session.read().as_ref().map(f)
    }
}

/// Resolve and log the variables of every probe frame.
///
/// Failures are logged. Returns the number of variables resolved.
pub fn probe_system_variables(frames: &Arc<dyn FrameProvider>, probes: &[ProbeConfig]) -> usize {
    let mut resolved = 0;
    for probe in probes {
        let frame = FrameId::new(&probe.io_system, &probe.buffer);
        let mut handle = match FrameHandle::acquire(frames.clone(), frame, AccessMode::Read) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Probe {}/{} skipped: {e}", probe.io_system, probe.buffer);
                continue;
            }
        };
        for variable in &probe.variables {
            match handle.resolve_bit(variable.as_str()) {
                Ok(location) => {
                    info!("Probe {variable}: {location}");
                    resolved += 1;
                }
                Err(e) => warn!("Probe {variable}: {e}"),
            }
        }
        handle.release();
    }
    resolved
}
