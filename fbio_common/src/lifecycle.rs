//! Host lifecycle operations.
//!
//! The host announces its operation state through a callback. Each state
//! maps to one of three runtime actions (see [`PlcOperation::action`]).

use std::fmt;
use std::str::FromStr;

/// Operation state delivered by the host firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlcOperation {
    /// Program is being loaded.
    Load,
    /// Program setup.
    Setup,
    /// Cold start (retained data reset).
    StartCold,
    /// Warm start. Host services are available from here on.
    StartWarm,
    /// Hot start (resume).
    StartHot,
    /// Program stopped.
    Stop,
    /// Program reset.
    Reset,
    /// Program unloaded.
    Unload,
    /// No operation.
    #[default]
    None,
}

/// What the runtime does in response to a [`PlcOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Initialize services once, then start processing.
    InitAndStart,
    /// Stop processing.
    Stop,
    /// Log only.
    Ignore,
}

impl PlcOperation {
    /// All operations, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Load,
        Self::Setup,
        Self::StartCold,
        Self::StartWarm,
        Self::StartHot,
        Self::Stop,
        Self::Reset,
        Self::Unload,
        Self::None,
    ];

    /// Runtime action for this operation.
    pub const fn action(self) -> LifecycleAction {
        match self {
            Self::StartCold | Self::StartWarm | Self::StartHot => LifecycleAction::InitAndStart,
            Self::Stop | Self::Reset | Self::Unload => LifecycleAction::Stop,
            Self::Load | Self::Setup | Self::None => LifecycleAction::Ignore,
        }
    }

    /// Canonical name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "Load",
            Self::Setup => "Setup",
            Self::StartCold => "StartCold",
            Self::StartWarm => "StartWarm",
            Self::StartHot => "StartHot",
            Self::Stop => "Stop",
            Self::Reset => "Reset",
            Self::Unload => "Unload",
            Self::None => "None",
        }
    }
}

impl fmt::Display for PlcOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlcOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown PlcOperation: {s:?}"))
    }
}
