//! In-process stand-ins for the host services.
//!
//! The binary runs against these; tests use them to drive the runtime
//! deterministically.

mod clock;
mod device;
mod fieldbus;
mod variables;

pub use clock::SimulatedClock;
pub use device::StaticDeviceStatus;
pub use fieldbus::SimulatedFieldbus;
pub use variables::SimulatedVariables;

use std::sync::Arc;

use fbio_frame::LocalFrameProvider;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::runtime::Services;

/// The simulated host: frames, process variables and device status.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Frame provider.
    pub frames: Arc<LocalFrameProvider>,
    /// Subscription provider.
    pub variables: Arc<SimulatedVariables>,
    /// Device-status provider.
    pub device: Arc<StaticDeviceStatus>,
}

impl Simulation {
    /// Build the simulated host from `[simulation]`.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        Ok(Self {
            frames: Arc::new(LocalFrameProvider::from_layouts(&config.simulation.frames)?),
            variables: Arc::new(SimulatedVariables::new()),
            device: Arc::new(StaticDeviceStatus::sample(&config.simulation.vendor_name)),
        })
    }

    /// Host services for a [`crate::Runtime`].
    pub fn services(&self) -> Services {
        Services {
            frames: self.frames.clone(),
            subscriptions: self.variables.clone(),
            device_status: self.device.clone(),
        }
    }

    /// Producer for the configured process frames.
    pub fn fieldbus(&self, config: &RuntimeConfig) -> Result<SimulatedFieldbus, RuntimeError> {
        SimulatedFieldbus::new(
            self.frames.clone(),
            &config.io,
            &config.simulation,
            self.variables.clone(),
        )
    }
}
