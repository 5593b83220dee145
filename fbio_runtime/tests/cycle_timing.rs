//! Executor timing properties against a simulated clock

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use fbio_runtime::cycle::{CycleError, CycleScheduler, CyclicExecutor, MonotonicInstant, Overrun};
use fbio_runtime::session::SharedSession;
use fbio_runtime::sim::SimulatedClock;
use proptest::prelude::*;

// ─── Helpers ────────────────────────────────────────────────────────

fn executor(clock: &SimulatedClock, period_us: u64) -> (CyclicExecutor<SimulatedClock>, Arc<SharedSession>) {
    let shared = Arc::new(SharedSession::new());
    let scheduler = CycleScheduler::new(Duration::from_micros(period_us), 450_000);
    (CyclicExecutor::new(clock.clone(), scheduler, shared.clone()), shared)
}

// ─── Drift and resynchronization ────────────────────────────────────

proptest! {
    #[test]
    fn nth_wake_is_first_plus_n_periods(
        period_us in 1u64..100_000,
        cycles in 1usize..200,
        start_ns in 0u64..10_000_000_000,
    ) {
        let clock = SimulatedClock::new(MonotonicInstant::from_nanos(start_ns));
        let (mut exec, _) = executor(&clock, period_us);
        for _ in 0..cycles {
            exec.tick().unwrap();
        }

        let wakes = clock.wakes();
        prop_assert_eq!(wakes.len(), cycles);
        let first = wakes[0];
        prop_assert_eq!(first.subsec_nanos(), 450_000);
        for (n, wake) in wakes.iter().enumerate() {
            prop_assert_eq!(wake.saturating_since(first), n as u64 * period_us * 1000);
        }
        prop_assert_eq!(exec.stats().overruns, 0);
    }

    #[test]
    fn overrun_resyncs_to_now_plus_period(
        period_us in 10u64..10_000,
        before in 1usize..20,
        extra in 1u64..1000,
    ) {
        let period_ns = period_us * 1000;
        let clock = SimulatedClock::new(MonotonicInstant::from_parts(7, 0));
        let (mut exec, shared) = executor(&clock, period_us);
        for _ in 0..before {
            exec.tick().unwrap();
        }

        // Cycle k wakes late by more than a period.
        clock.delay_next_wake(period_ns + extra);
        let late = exec.tick().unwrap();
        let woke = clock.instant();
        prop_assert_eq!(woke, late.deadline.add_nanos(period_ns + extra));

        let next = exec.tick().unwrap();
        prop_assert_eq!(next.deadline, woke.add_nanos(period_ns));
        prop_assert_ne!(next.deadline, late.deadline.add_nanos(2 * period_ns));
        prop_assert_eq!(
            next.overrun,
            Some(Overrun { now: woke, missed: late.deadline.add_nanos(period_ns) })
        );

        // Back on a regular grid from the new phase.
        let after = exec.tick().unwrap();
        prop_assert_eq!(after.deadline, next.deadline.add_nanos(period_ns));
        prop_assert!(after.overrun.is_none());
        prop_assert_eq!(shared.counters().snapshot().overruns, 1);
    }
}

#[test]
fn wake_latency_is_tracked() {
    let clock = SimulatedClock::new(MonotonicInstant::from_parts(1, 0));
    let (mut exec, shared) = executor(&clock, 1000);
    exec.tick().unwrap();
    clock.delay_next_wake(30_000);
    exec.tick().unwrap();

    assert_eq!(exec.stats().max_latency_ns, 30_000);
    assert_eq!(exec.stats().cycle_count, 2);
    assert_eq!(shared.counters().snapshot().max_latency_ns, 30_000);
}

// ─── Clock failure ──────────────────────────────────────────────────

#[test]
fn clock_failure_ends_the_loop() {
    let clock = SimulatedClock::new(MonotonicInstant::from_parts(1, 0));
    let (exec, shared) = executor(&clock, 1000);
    clock.set_failing(true);

    let alive = AtomicBool::new(true);
    let result = exec.run(&alive);
    assert!(matches!(result, Err(CycleError::Clock(_))));
    assert_eq!(shared.counters().snapshot().cycles, 0);
}

#[test]
fn cleared_alive_flag_returns_stats() {
    let clock = SimulatedClock::new(MonotonicInstant::from_parts(1, 0));
    let (exec, _) = executor(&clock, 1000);
    let stats = exec.run(&AtomicBool::new(false)).unwrap();
    assert_eq!(stats.cycle_count, 0);
}
