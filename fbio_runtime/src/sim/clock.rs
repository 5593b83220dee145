//! Deterministic clock for executor tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cycle::{CycleClock, CycleError, MonotonicInstant};

#[derive(Debug, Default)]
struct ClockState {
    now: MonotonicInstant,
    delays: VecDeque<u64>,
    wakes: Vec<MonotonicInstant>,
    failing: bool,
}

/// Manually driven [`CycleClock`].
///
/// Time only moves in `sleep_until` (to the deadline, plus any queued
/// delay) and in [`SimulatedClock::advance`]. Clones share the same
/// time line, so a test keeps one clone while the executor owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    state: Arc<Mutex<ClockState>>,
}

impl SimulatedClock {
    /// Clock starting at `start`.
    pub fn new(start: MonotonicInstant) -> Self {
        let clock = Self::default();
        clock.state.lock().now = start;
        clock
    }

    /// Current simulated time.
    pub fn instant(&self) -> MonotonicInstant {
        self.state.lock().now
    }

    /// Move time forward, e.g. to model cycle work.
    pub fn advance(&self, nanos: u64) {
        let mut state = self.state.lock();
        state.now = state.now.add_nanos(nanos);
    }

    /// Wake the next sleep `nanos` past its deadline.
    pub fn delay_next_wake(&self, nanos: u64) {
        self.state.lock().delays.push_back(nanos);
    }

    /// Make every call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Wake times so far.
    pub fn wakes(&self) -> Vec<MonotonicInstant> {
        self.state.lock().wakes.clone()
    }
}

impl CycleClock for SimulatedClock {
    fn now(&self) -> Result<MonotonicInstant, CycleError> {
        let state = self.state.lock();
        if state.failing {
            return Err(CycleError::Clock("simulated clock failure".into()));
        }
        Ok(state.now)
    }

    fn sleep_until(&self, deadline: MonotonicInstant) -> Result<(), CycleError> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(CycleError::Clock("simulated clock failure".into()));
        }
        let delay = state.delays.pop_front().unwrap_or(0);
        let wake = state.now.max(deadline).add_nanos(delay);
        state.now = wake;
        state.wakes.push(wake);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_moves_to_deadline_plus_delay() {
        let clock = SimulatedClock::new(MonotonicInstant::from_nanos(100));
        clock.sleep_until(MonotonicInstant::from_nanos(500)).unwrap();
        assert_eq!(clock.instant().as_nanos(), 500);

        clock.delay_next_wake(20);
        clock.sleep_until(MonotonicInstant::from_nanos(600)).unwrap();
        assert_eq!(clock.instant().as_nanos(), 620);

        // Past deadlines return at once.
        clock.sleep_until(MonotonicInstant::from_nanos(10)).unwrap();
        assert_eq!(clock.instant().as_nanos(), 620);
        assert_eq!(clock.wakes().len(), 3);
    }

    #[test]
    fn failing_clock_errors() {
        let clock = SimulatedClock::default();
        clock.set_failing(true);
        assert!(matches!(clock.now(), Err(CycleError::Clock(_))));
    }
}
