//! Upstream fieldbus producer.
//!
//! Owns the write lease on the input frame and a read lease on the output
//! frame. Each step increments a counter, writes it into the pattern byte
//! (so the sample inputs walk through every bit combination), publishes
//! the low counter bits as process variables and logs the output byte.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use fbio::io::{IoConfig, PortName};
use fbio::variant::Variant;
use fbio_frame::{AccessMode, FrameHandle, FrameId, FrameProvider};
use tracing::debug;

use crate::config::SimulationConfig;
use crate::error::RuntimeError;
use crate::sim::SimulatedVariables;

/// Simulated I/O device driving the input frame.
#[derive(Debug)]
pub struct SimulatedFieldbus {
    input: FrameHandle,
    output: FrameHandle,
    pattern_offset: Option<usize>,
    variables: Arc<SimulatedVariables>,
    published: Vec<PortName>,
    period: Duration,
    counter: u8,
}

impl SimulatedFieldbus {
    /// Lease the process frames of `io`.
    ///
    /// # Errors
    /// The input frame already has a writer, a frame is unknown, or the
    /// pattern variable does not resolve.
    pub fn new(
        frames: Arc<dyn FrameProvider>,
        io: &IoConfig,
        sim: &SimulationConfig,
        variables: Arc<SimulatedVariables>,
    ) -> Result<Self, RuntimeError> {
        let input = FrameHandle::acquire(
            frames.clone(),
            FrameId::new(&io.io_system, &io.input_buffer),
            AccessMode::Write,
        )?;
        let output = FrameHandle::acquire(
            frames,
            FrameId::new(&io.io_system, &io.output_buffer),
            AccessMode::Read,
        )?;
        let pattern_offset = sim
            .pattern_variable
            .as_ref()
            .map(|id| input.resolve_offset(id.as_str()))
            .transpose()?;
        Ok(Self {
            input,
            output,
            pattern_offset,
            variables,
            published: sim.published_variables.clone(),
            period: sim.pattern_period(),
            counter: 0,
        })
    }

    /// Advance the pattern once. Returns the new counter value.
    pub fn step(&mut self) -> u8 {
        self.counter = self.counter.wrapping_add(1);
        let counter = self.counter;

        if let Some(offset) = self.pattern_offset {
            let written = self.input.scoped_write(|frame| {
                if let Some(byte) = frame.get_mut(offset) {
                    *byte = counter;
                }
            });
            if let Err(e) = written {
                debug!("Pattern write skipped: {e}");
            }
        }

        for (bit, name) in self.published.iter().enumerate() {
            let value = bit < 8 && (counter >> bit) & 1 != 0;
            self.variables.publish(name.as_str(), Variant::Bool(value));
        }

        match self.output.scoped_read(|frame| frame.first().copied()) {
            Ok(Some(byte)) => debug!("Input pattern {counter:#04x}, outputs {byte:#010b}"),
            Ok(None) => {}
            Err(e) => debug!("Output observe skipped: {e}"),
        }
        counter
    }

    /// Step every pattern period until `alive` clears.
    pub fn run(mut self, alive: &AtomicBool) {
        debug!("Simulated fieldbus started ({:?})", self.period);
        while alive.load(Ordering::Acquire) {
            self.step();
            thread::park_timeout(self.period);
        }
        debug!("Simulated fieldbus finished at {:#04x}", self.counter);
    }
}

#[cfg(test)]
mod tests {
    use fbio_frame::LocalFrameProvider;

    use super::*;

    #[test]
    fn step_writes_pattern_and_publishes_bits() {
        let config = SimulationConfig::default();
        let frames = Arc::new(LocalFrameProvider::from_layouts(&config.frames).unwrap());
        let variables = Arc::new(SimulatedVariables::new());
        let mut bus =
            SimulatedFieldbus::new(frames.clone(), &IoConfig::default(), &config, variables.clone()).unwrap();

        assert_eq!(bus.step(), 1);
        assert_eq!(bus.step(), 2);

        let input = frames.buffer(&FrameId::new("DeviceBus", "1:IN")).unwrap();
        assert_eq!(input.begin_read().unwrap()[2], 2);
        assert_eq!(variables.value("Plc.Eclr/MyProgramInst.VarA"), Variant::Bool(false));
        assert_eq!(variables.value("Plc.Eclr/MyProgramInst.VarB"), Variant::Bool(true));
    }

    #[test]
    fn second_producer_is_rejected() {
        let config = SimulationConfig::default();
        let frames = Arc::new(LocalFrameProvider::from_layouts(&config.frames).unwrap());
        let variables = Arc::new(SimulatedVariables::new());
        let _first =
            SimulatedFieldbus::new(frames.clone(), &IoConfig::default(), &config, variables.clone()).unwrap();
        let second = SimulatedFieldbus::new(frames, &IoConfig::default(), &config, variables);
        assert!(matches!(second, Err(RuntimeError::Frame(_))));
    }
}
