//! Diagnostic loop.
//!
//! Logs every registered point at a coarse period. It reads the values the
//! executor already copied into the registry and never touches a frame, so
//! it cannot delay the RT path. The view may lag the frame by one cycle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, info};

use crate::config::DiagnosticConfig;
use crate::registry::{IoPoint, IoRegistry};
use crate::session::SharedSession;

/// Logged value of one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordValue {
    /// Boolean point.
    Bit(bool),
    /// First byte of a byte point.
    FirstByte(u8),
}

/// One diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Point id.
    pub id: String,
    /// Current value.
    pub value: RecordValue,
}

impl DiagnosticRecord {
    /// Record for `point`'s current value.
    pub fn of(point: &IoPoint) -> Self {
        let value = if point.is_boolean() {
            RecordValue::Bit(point.get_bool())
        } else {
            RecordValue::FirstByte(point.first_byte())
        };
        Self {
            id: point.id().to_string(),
            value,
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            RecordValue::Bit(v) => write!(f, "{}: {v}", self.id),
            RecordValue::FirstByte(b) => write!(f, "{}: {b:#04x}", self.id),
        }
    }
}

/// Records for every point, inputs first.
pub fn snapshot(registry: &IoRegistry) -> Vec<DiagnosticRecord> {
    registry.iter().map(DiagnosticRecord::of).collect()
}

/// Periodic registry logger.
#[derive(Debug)]
pub struct DiagnosticLoop {
    shared: Arc<SharedSession>,
    config: DiagnosticConfig,
    ticks: u64,
}

impl DiagnosticLoop {
    /// Loop over `shared`.
    pub fn new(shared: Arc<SharedSession>, config: DiagnosticConfig) -> Self {
        Self {
            shared,
            config,
            ticks: 0,
        }
    }

    /// Log one record per point if processing. Returns the records logged.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        if self.ticks % self.config.stats_every == 0 {
            info!("Cycle counters: {}", self.shared.counters().snapshot());
        }
        if !self.shared.is_processing() {
            return 0;
        }
        self.shared
            .with_session(|session| {
                let records = snapshot(session.registry());
                for record in &records {
                    info!(target: "fbio::io", "{record}");
                }
                records.len()
            })
            .unwrap_or(0)
    }

    /// Tick every period until `alive` clears.
    pub fn run(mut self, alive: &AtomicBool) {
        let period = self.config.period();
        debug!("Diagnostic loop started ({period:?})");
        while alive.load(Ordering::Acquire) {
            self.tick();
            thread::park_timeout(period);
        }
        debug!("Diagnostic loop finished after {} ticks", self.ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_formats() {
        let bit = DiagnosticRecord {
            id: "DeviceBus/0.IN04".into(),
            value: RecordValue::Bit(true),
        };
        let byte = DiagnosticRecord {
            id: "DeviceBus/0.~DI8".into(),
            value: RecordValue::FirstByte(0x0a),
        };
        assert_eq!(bit.to_string(), "DeviceBus/0.IN04: true");
        assert_eq!(byte.to_string(), "DeviceBus/0.~DI8: 0x0a");
    }

    #[test]
    fn idle_tick_logs_nothing() {
        let mut diag = DiagnosticLoop::new(Arc::new(SharedSession::new()), DiagnosticConfig::default());
        assert_eq!(diag.tick(), 0);
    }
}
