//! Runtime error taxonomy.
//!
//! | Class              | Variant                                   | Handling                      |
//! |--------------------|-------------------------------------------|-------------------------------|
//! | Resolution failure | [`RegistryError::Resolution`]             | point excluded, logged        |
//! | Transient I/O      | `FrameError::NotReady`                    | value held, cycle continues   |
//! | Protocol mismatch  | [`SubscriptionError::LengthMismatch`]     | tick skipped                  |
//! | Clock failure      | [`CycleError::Clock`]                     | executor stops                |
//! | Lifecycle misuse   | (none)                                    | logged no-op                  |
//! | Invalid config     | [`RuntimeError::Config`]                  | init refused                  |

use fbio::config::ConfigError;
use fbio_frame::FrameError;
use thiserror::Error;

pub use crate::cycle::CycleError;
pub use crate::registry::RegistryError;
pub use crate::subscription::SubscriptionError;

/// Any failure surfaced by the runtime's lifecycle operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Frame acquisition or access failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// I/O point registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Subscription provider failure.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// RT setup or clock failure.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A runtime thread could not be spawned.
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        /// Thread name.
        thread: &'static str,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// A runtime thread ended before reporting readiness.
    #[error("{0} thread exited during startup")]
    ThreadExited(&'static str),
}
