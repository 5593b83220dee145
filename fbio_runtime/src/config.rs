//! Runtime configuration.
//!
//! One TOML file, one section per component. Every field has a default,
//! so an empty file yields the sample setup (a DI8/DO8 module on
//! `DeviceBus`, the AND/heartbeat/mirror logic, three subscribed ports).
//!
//! ```toml
//! [shared]
//! log_level = "info"
//!
//! [cycle]
//! period_us = 1000
//! rt_priority = 80
//! cpu_core = 1
//!
//! [subscription]
//! variables = ["Plc.Eclr/MyProgramInst.VarA"]
//! ```

use std::path::Path;
use std::time::Duration;

use fbio::config::{ConfigError, ConfigLoader, SharedConfig, Validate};
use fbio::consts::{
    CYCLE_TIME_US, DEFAULT_INPUT_BUFFER, DEFAULT_IO_SYSTEM, DEFAULT_OUTPUT_BUFFER,
    DEFAULT_RT_PRIORITY, DIAGNOSTIC_PERIOD_MS, FIRST_CYCLE_OFFSET_NS, NANOS_PER_SEC,
    RT_PRIORITY_MAX, RT_PRIORITY_MIN, SUBSCRIPTION_POLL_MS, SUBSCRIPTION_SAMPLE_US,
};
use fbio::io::config::sample_layouts;
use fbio::io::{FrameLayoutConfig, IoConfig, IoPointId, PortName};
use serde::{Deserialize, Serialize};

use crate::subscription::SubscriptionKind;

// ─── Root ───────────────────────────────────────────────────────────

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Logging and instance name.
    pub shared: SharedConfig,
    /// RT executor timing and thread setup.
    pub cycle: CycleConfig,
    /// Diagnostic loop.
    pub diagnostic: DiagnosticConfig,
    /// Subscription poll loop.
    pub subscription: SubscriptionConfig,
    /// Frames and I/O points.
    pub io: IoConfig,
    /// Sample logic wiring.
    pub logic: LogicConfig,
    /// In-process stand-ins for the host services.
    pub simulation: SimulationConfig,
}

impl RuntimeConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    ///
    /// Parse and validation errors are returned as-is. The fallback is
    /// silent; this runs before logging is set up, so the caller reports it.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::FileNotFound) => Self::default(),
            Err(e) => return Err(e),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Validate for RuntimeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.cycle.validate()?;
        self.diagnostic.validate()?;
        self.subscription.validate()?;
        self.io.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

// ─── [cycle] ────────────────────────────────────────────────────────

/// RT executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Cycle period [µs].
    pub period_us: u64,
    /// Phase of the first deadline past the next full second [ns].
    pub first_cycle_offset_ns: u64,
    /// SCHED_FIFO priority of the RT thread.
    pub rt_priority: i32,
    /// CPU core to pin the RT thread to.
    pub cpu_core: Option<usize>,
    /// `mlockall` before entering the loop.
    pub lock_memory: bool,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_us: CYCLE_TIME_US,
            first_cycle_offset_ns: FIRST_CYCLE_OFFSET_NS,
            rt_priority: DEFAULT_RT_PRIORITY,
            cpu_core: None,
            lock_memory: true,
        }
    }
}

impl CycleConfig {
    /// Cycle period.
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.period_us == 0 {
            return Err(ConfigError::ValidationError(
                "cycle.period_us must be non-zero".into(),
            ));
        }
        if self.first_cycle_offset_ns >= NANOS_PER_SEC {
            return Err(ConfigError::ValidationError(format!(
                "cycle.first_cycle_offset_ns must be below {NANOS_PER_SEC}"
            )));
        }
        if !(RT_PRIORITY_MIN..=RT_PRIORITY_MAX).contains(&self.rt_priority) {
            return Err(ConfigError::ValidationError(format!(
                "cycle.rt_priority {} outside {RT_PRIORITY_MIN}..={RT_PRIORITY_MAX}",
                self.rt_priority
            )));
        }
        Ok(())
    }
}

// ─── [diagnostic] ───────────────────────────────────────────────────

/// Diagnostic loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    /// Tick period [ms].
    pub period_ms: u64,
    /// Log cycle counters every N ticks.
    pub stats_every: u64,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            period_ms: DIAGNOSTIC_PERIOD_MS,
            stats_every: 10,
        }
    }
}

impl DiagnosticConfig {
    /// Tick period.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 || self.stats_every == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostic.period_ms and diagnostic.stats_every must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

// ─── [subscription] ─────────────────────────────────────────────────

/// Subscription loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Provider-side delivery class.
    pub kind: SubscriptionKind,
    /// Poll period of the worker [ms].
    pub poll_interval_ms: u64,
    /// Provider sample interval [µs].
    pub sample_interval_us: u64,
    /// Tracked process variables.
    pub variables: Vec<PortName>,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            kind: SubscriptionKind::default(),
            poll_interval_ms: SUBSCRIPTION_POLL_MS,
            sample_interval_us: SUBSCRIPTION_SAMPLE_US,
            variables: sample_variables(),
        }
    }
}

impl SubscriptionConfig {
    /// Worker poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Provider sample interval.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_micros(self.sample_interval_us)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.sample_interval_us == 0 {
            return Err(ConfigError::ValidationError(
                "subscription intervals must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// `VarA`, `VarB` and `VarC` of `MyProgramInst`.
pub fn sample_variables() -> Vec<PortName> {
    ["VarA", "VarB", "VarC"]
        .iter()
        .filter_map(|port| format!("Plc.Eclr/MyProgramInst.{port}").parse().ok())
        .collect()
}

// ─── [logic] ────────────────────────────────────────────────────────

/// `output = inputs[0] && inputs[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndRule {
    /// Operands.
    pub inputs: [IoPointId; 2],
    /// Result.
    pub output: IoPointId,
}

/// `output = input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRule {
    /// Source input.
    pub input: IoPointId,
    /// Target output.
    pub output: IoPointId,
}

/// Wiring of the sample logic.
///
/// A missing `[logic]` section selects [`sample_logic`]. A present one
/// enables only the rules it lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicConfig {
    /// AND of two inputs.
    #[serde(default)]
    pub and_rule: Option<AndRule>,
    /// Output inverted every cycle.
    #[serde(default)]
    pub heartbeat: Option<IoPointId>,
    /// Input copied to an output.
    #[serde(default)]
    pub mirror: Option<MirrorRule>,
}

impl Default for LogicConfig {
    fn default() -> Self {
        sample_logic(DEFAULT_IO_SYSTEM)
    }
}

/// OUT05 = IN04 && IN05, OUT04 heartbeat, OUT06 = IN04.
pub fn sample_logic(io_system: &str) -> LogicConfig {
    let point = |name: &str| IoPointId::device(io_system, 0, name).ok();
    let and_rule = match (point("IN04"), point("IN05"), point("OUT05")) {
        (Some(a), Some(b), Some(output)) => Some(AndRule {
            inputs: [a, b],
            output,
        }),
        _ => None,
    };
    let mirror = match (point("IN04"), point("OUT06")) {
        (Some(input), Some(output)) => Some(MirrorRule { input, output }),
        _ => None,
    };
    LogicConfig {
        and_rule,
        heartbeat: point("OUT04"),
        mirror,
    }
}

// ─── [simulation] ───────────────────────────────────────────────────

/// In-process host stand-ins used by the binary and the tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Frames served by the local frame provider.
    pub frames: Vec<FrameLayoutConfig>,
    /// Input pattern step period [ms].
    pub pattern_period_ms: u64,
    /// Byte-addressed input variable that receives the pattern counter.
    pub pattern_variable: Option<IoPointId>,
    /// Process variables published from the pattern, one bit each.
    pub published_variables: Vec<PortName>,
    /// `General.VendorName` reported by the static device status.
    pub vendor_name: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frames: sample_layouts(DEFAULT_IO_SYSTEM, DEFAULT_INPUT_BUFFER, DEFAULT_OUTPUT_BUFFER),
            pattern_period_ms: 500,
            pattern_variable: IoPointId::device(DEFAULT_IO_SYSTEM, 0, "~DI8").ok(),
            published_variables: sample_variables().into_iter().take(2).collect(),
            vendor_name: "Fieldbus I/O Simulator".to_string(),
        }
    }
}

impl SimulationConfig {
    /// Pattern step period.
    pub fn pattern_period(&self) -> Duration {
        Duration::from_millis(self.pattern_period_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pattern_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.pattern_period_ms must be non-zero".into(),
            ));
        }
        self.frames.iter().try_for_each(FrameLayoutConfig::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_yields_valid_sample() {
        let config = RuntimeConfig::from_toml("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.cycle.period(), Duration::from_millis(1));
        assert_eq!(config.cycle.rt_priority, 80);
        assert_eq!(config.subscription.variables.len(), 3);
        assert_eq!(config.subscription.sample_interval(), Duration::from_secs(1));
        assert_eq!(config.io.points.len(), 10);
        assert!(config.logic.and_rule.is_some());
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
            [cycle]
            period_us = 500
            cpu_core = 2

            [subscription]
            kind = "real_time"
            variables = ["Plc.Eclr/Main.Speed"]

            [logic]
            heartbeat = "DeviceBus/0.OUT07"
        "#;
        let config = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(config.cycle.period_us, 500);
        assert_eq!(config.cycle.cpu_core, Some(2));
        assert_eq!(config.cycle.rt_priority, 80);
        assert_eq!(config.subscription.kind, SubscriptionKind::RealTime);
        assert_eq!(config.subscription.variables[0].port(), "Speed");
        assert_eq!(
            config.logic.heartbeat.as_ref().map(IoPointId::as_str),
            Some("DeviceBus/0.OUT07")
        );
        // Rules not mentioned in a present section are off.
        assert!(config.logic.and_rule.is_none());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = RuntimeConfig::from_toml(include_str!("../../config/runtime.toml")).unwrap();
        config.validate().unwrap();
        let defaults = RuntimeConfig::default();
        assert_eq!(config.cycle, defaults.cycle);
        assert_eq!(config.io, defaults.io);
        assert_eq!(config.logic, defaults.logic);
        assert_eq!(config.subscription, defaults.subscription);
        assert_eq!(config.simulation, defaults.simulation);
    }

    #[test]
    fn rejects_out_of_range_priority() {
        let config = RuntimeConfig::from_toml("[cycle]\nrt_priority = 120").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_zero_periods() {
        for toml in [
            "[cycle]\nperiod_us = 0",
            "[diagnostic]\nperiod_ms = 0",
            "[subscription]\npoll_interval_ms = 0",
        ] {
            let config = RuntimeConfig::from_toml(toml).unwrap();
            assert!(config.validate().is_err(), "{toml}");
        }
    }

    #[test]
    fn rejects_malformed_port_name() {
        let result = RuntimeConfig::from_toml("[subscription]\nvariables = [\"NoSlash\"]");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RuntimeConfig::load_or_default(Path::new("/nonexistent/runtime.toml")).unwrap();
        assert_eq!(config.io.io_system, "DeviceBus");
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[diagnostic]\nstats_every = 50").unwrap();
        let config = RuntimeConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.diagnostic.stats_every, 50);
        assert_eq!(config.diagnostic.period_ms, 100);
    }
}
