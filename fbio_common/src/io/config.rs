//! I/O configuration structs.
//!
//! Deserialized from the `[io]` and `[simulation]` sections of the runtime
//! config. Points are resolved against the frame provider at start of
//! processing; layouts only describe the in-process provider.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::id::IoPointId;
use crate::config::ConfigError;
use crate::consts::{
    DEFAULT_INPUT_BUFFER, DEFAULT_IO_SYSTEM, DEFAULT_OUTPUT_BUFFER, MAX_POINT_BYTES,
    MAX_POINTS_PER_FRAME,
};

// ─── Direction ──────────────────────────────────────────────────────

/// Frame direction as seen from the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Fieldbus → runtime.
    Input,
    /// Runtime → fieldbus.
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

// ─── Points ─────────────────────────────────────────────────────────

/// One symbolic I/O point to register at start of processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointConfig {
    /// Frame variable identifier.
    pub id: IoPointId,
    /// Which frame the point lives in.
    pub direction: Direction,
    /// Width in bytes (must be 1 for boolean points).
    #[serde(default = "default_size")]
    pub size_bytes: usize,
    /// Bit-packed boolean point.
    #[serde(default)]
    pub boolean: bool,
}

fn default_size() -> usize {
    1
}

impl PointConfig {
    /// Boolean point of the given direction.
    pub fn boolean(id: IoPointId, direction: Direction) -> Self {
        Self {
            id,
            direction,
            size_bytes: 1,
            boolean: true,
        }
    }

    /// Byte-valued point of the given width.
    pub fn bytes(id: IoPointId, direction: Direction, size_bytes: usize) -> Self {
        Self {
            id,
            direction,
            size_bytes,
            boolean: false,
        }
    }
}

/// Extra frame whose variables are resolved once and logged at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// I/O system id of the frame.
    pub io_system: String,
    /// Buffer id of the frame.
    pub buffer: String,
    /// Bit-addressed variables to resolve.
    #[serde(default)]
    pub variables: Vec<IoPointId>,
}

/// `[io]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// I/O system carrying the process frames.
    pub io_system: String,
    /// Input buffer id.
    pub input_buffer: String,
    /// Output buffer id.
    pub output_buffer: String,
    /// Points registered at start of processing.
    pub points: Vec<PointConfig>,
    /// Optional system-variable probes.
    pub probes: Vec<ProbeConfig>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            io_system: DEFAULT_IO_SYSTEM.to_string(),
            input_buffer: DEFAULT_INPUT_BUFFER.to_string(),
            output_buffer: DEFAULT_OUTPUT_BUFFER.to_string(),
            points: sample_points(DEFAULT_IO_SYSTEM),
            probes: Vec::new(),
        }
    }
}

impl IoConfig {
    /// Points of one direction, in configuration order.
    pub fn points_for(&self, direction: Direction) -> impl Iterator<Item = &PointConfig> {
        self.points.iter().filter(move |p| p.direction == direction)
    }

    /// Validate point shapes and table limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_system.is_empty() || self.input_buffer.is_empty() || self.output_buffer.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "io_system, input_buffer and output_buffer must be set".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for point in &self.points {
            if point.boolean && point.size_bytes != 1 {
                return Err(ConfigError::ValidationError(format!(
                    "{}: boolean points are 1 byte wide, got {}",
                    point.id, point.size_bytes
                )));
            }
            if point.size_bytes == 0 || point.size_bytes > MAX_POINT_BYTES {
                return Err(ConfigError::ValidationError(format!(
                    "{}: size_bytes must be 1..={MAX_POINT_BYTES}",
                    point.id
                )));
            }
            if !seen.insert((point.direction, point.id.as_str())) {
                return Err(ConfigError::ValidationError(format!(
                    "{}: registered twice as {}",
                    point.id, point.direction
                )));
            }
        }

        for direction in [Direction::Input, Direction::Output] {
            let count = self.points_for(direction).count();
            if count > MAX_POINTS_PER_FRAME {
                return Err(ConfigError::ValidationError(format!(
                    "{count} {direction} points exceed the per-frame limit of {MAX_POINTS_PER_FRAME}"
                )));
            }
        }
        Ok(())
    }
}

/// Sample point set: a DI8/DO8 module plus the bus status register.
pub fn sample_points(io_system: &str) -> Vec<PointConfig> {
    let mut points = Vec::new();
    if let Ok(id) = IoPointId::device(io_system, 0, "~DI8") {
        points.push(PointConfig::bytes(id, Direction::Input, 1));
    }
    for n in 4..8 {
        if let Ok(id) = IoPointId::device(io_system, 0, &format!("IN{n:02}")) {
            points.push(PointConfig::boolean(id, Direction::Input));
        }
    }
    if let Ok(id) = IoPointId::system_variable(io_system, "DIAG_STATUS_REG") {
        points.push(PointConfig::bytes(id, Direction::Input, 2));
    }
    for n in 4..8 {
        if let Ok(id) = IoPointId::device(io_system, 0, &format!("OUT{n:02}")) {
            points.push(PointConfig::boolean(id, Direction::Output));
        }
    }
    points
}

// ─── Frame layouts ──────────────────────────────────────────────────

/// Location of one named variable inside a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableLayoutConfig {
    /// Variable identifier as requested by clients.
    pub name: String,
    /// Byte offset.
    pub offset: usize,
    /// Bit index for bit-addressable variables.
    #[serde(default)]
    pub bit: Option<u8>,
}

/// Named frame served by the in-process provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayoutConfig {
    /// I/O system id.
    pub io_system: String,
    /// Buffer id on that system.
    pub buffer: String,
    /// Frame size in bytes.
    pub size: usize,
    /// Variable table.
    #[serde(default)]
    pub variables: Vec<VariableLayoutConfig>,
}

impl FrameLayoutConfig {
    /// Check offsets, bit indices and duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::ValidationError(format!(
                "frame {}/{} has zero size",
                self.io_system, self.buffer
            )));
        }
        let mut names = HashSet::new();
        for var in &self.variables {
            if var.offset >= self.size {
                return Err(ConfigError::ValidationError(format!(
                    "{}: offset {} outside {}-byte frame {}",
                    var.name, var.offset, self.size, self.buffer
                )));
            }
            if matches!(var.bit, Some(b) if b > 7) {
                return Err(ConfigError::ValidationError(format!(
                    "{}: bit index must be 0..=7",
                    var.name
                )));
            }
            if !names.insert(var.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "{}: duplicate variable in frame {}",
                    var.name, self.buffer
                )));
            }
        }
        Ok(())
    }
}

/// Frame layouts matching [`sample_points`].
///
/// Input frame: status register at 0..2, the DI byte at 2 with `IN00..IN07`
/// as its bits. Output frame: the DO byte at 0 with `OUT00..OUT07`.
pub fn sample_layouts(io_system: &str, input_buffer: &str, output_buffer: &str) -> Vec<FrameLayoutConfig> {
    let var = |name: String, offset: usize, bit: Option<u8>| VariableLayoutConfig { name, offset, bit };

    let mut input = vec![
        var(format!("{io_system}/DIAG_STATUS_REG"), 0, None),
        var(format!("{io_system}/0.~DI8"), 2, None),
    ];
    input.extend((0..8u8).map(|b| var(format!("{io_system}/0.IN{b:02}"), 2, Some(b))));

    let mut output = vec![var(format!("{io_system}/0.~DO8"), 0, None)];
    output.extend((0..8u8).map(|b| var(format!("{io_system}/0.OUT{b:02}"), 0, Some(b))));

    vec![
        FrameLayoutConfig {
            io_system: io_system.to_string(),
            buffer: input_buffer.to_string(),
            size: 8,
            variables: input,
        },
        FrameLayoutConfig {
            io_system: io_system.to_string(),
            buffer: output_buffer.to_string(),
            size: 8,
            variables: output,
        },
    ]
}
