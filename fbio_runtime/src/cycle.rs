//! Deterministic RT cycle: wait → read → logic → write.
//!
//! ## Timing
//! Absolute deadlines on `CLOCK_MONOTONIC`. The first deadline is anchored
//! to the next full second plus a fixed offset; every later one is the
//! previous deadline plus one period, never "now + period", so no drift
//! accumulates. An overrun (`now > deadline`) is logged with both
//! timestamps and the schedule resynchronizes to `now + period`.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. Prefault stack pages
//! 3. `sched_setaffinity` to the configured core
//! 4. `sched_setscheduler(SCHED_FIFO, priority)`
//!
//! All four are no-ops without the `rt` feature.
//!
//! ## Failure policy
//! Transient frame failures are counted and logged; the loop continues.
//! A clock failure ends the loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use fbio::consts::NANOS_PER_SEC;
use static_assertions::const_assert;
use thiserror::Error;
use tracing::{error, info};

use crate::config::CycleConfig;
use crate::session::SharedSession;

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or cycle execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    /// The monotonic clock could not be read or waited on.
    #[error("monotonic clock unavailable: {0}")]
    Clock(String),
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

/// Log the first 10 occurrences of an RT-path event, then every 1000th.
#[inline]
pub const fn should_log(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

// ─── Time base ──────────────────────────────────────────────────────

/// Point on the monotonic time line [ns].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MonotonicInstant(u64);

impl MonotonicInstant {
    /// From nanoseconds since the clock's epoch.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// From seconds and nanoseconds.
    pub const fn from_parts(secs: u64, nanos: u64) -> Self {
        Self(secs * NANOS_PER_SEC + nanos)
    }

    /// Nanoseconds since the clock's epoch.
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Whole seconds.
    pub const fn secs(self) -> u64 {
        self.0 / NANOS_PER_SEC
    }

    /// Nanoseconds past [`Self::secs`].
    pub const fn subsec_nanos(self) -> u64 {
        self.0 % NANOS_PER_SEC
    }

    /// `self + nanos`.
    pub const fn add_nanos(self, nanos: u64) -> Self {
        Self(self.0 + nanos)
    }

    /// `self - earlier`, or 0 if `earlier` is later.
    pub const fn saturating_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for MonotonicInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sec {} nsec", self.secs(), self.subsec_nanos())
    }
}

/// Time source of the cyclic executor.
pub trait CycleClock: Send {
    /// Current time.
    fn now(&self) -> Result<MonotonicInstant, CycleError>;

    /// Block until `deadline`. Returns immediately if it already passed.
    fn sleep_until(&self, deadline: MonotonicInstant) -> Result<(), CycleError>;
}

impl<C: CycleClock + ?Sized> CycleClock for Box<C> {
    fn now(&self) -> Result<MonotonicInstant, CycleError> {
        (**self).now()
    }

    fn sleep_until(&self, deadline: MonotonicInstant) -> Result<(), CycleError> {
        (**self).sleep_until(deadline)
    }
}

/// `CLOCK_MONOTONIC` with `clock_nanosleep(TIMER_ABSTIME)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl CycleClock for MonotonicClock {
    fn now(&self) -> Result<MonotonicInstant, CycleError> {
        use nix::time::{ClockId, clock_gettime};

        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| CycleError::Clock(format!("clock_gettime: {e}")))?;
        Ok(MonotonicInstant::from_parts(ts.tv_sec() as u64, ts.tv_nsec() as u64))
    }

    fn sleep_until(&self, deadline: MonotonicInstant) -> Result<(), CycleError> {
        use nix::errno::Errno;
        use nix::sys::time::TimeSpec;
        use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};

        let ts = TimeSpec::new(deadline.secs() as _, deadline.subsec_nanos() as _);
        loop {
            match clock_nanosleep(ClockId::CLOCK_MONOTONIC, ClockNanosleepFlags::TIMER_ABSTIME, &ts) {
                Ok(_) => return Ok(()),
                // Absolute deadline: restarting after a signal is exact.
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(CycleError::Clock(format!("clock_nanosleep: {e}"))),
            }
        }
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

/// A missed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overrun {
    /// Time at which the miss was detected.
    pub now: MonotonicInstant,
    /// The deadline that had already passed.
    pub missed: MonotonicInstant,
}

/// Next deadline to sleep until.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Absolute wake time.
    pub deadline: MonotonicInstant,
    /// Set when the regular deadline had already passed.
    pub overrun: Option<Overrun>,
}

/// Absolute-deadline schedule.
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    period_ns: u64,
    first_offset_ns: u64,
    deadline: Option<MonotonicInstant>,
}

impl CycleScheduler {
    /// Schedule with the given period and first-cycle phase.
    pub fn new(period: Duration, first_offset_ns: u64) -> Self {
        Self {
            period_ns: period.as_nanos() as u64,
            first_offset_ns,
            deadline: None,
        }
    }

    /// Schedule from the `[cycle]` section.
    pub fn from_config(config: &CycleConfig) -> Self {
        Self::new(config.period(), config.first_cycle_offset_ns)
    }

    /// Period [ns].
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Last deadline handed out.
    pub fn deadline(&self) -> Option<MonotonicInstant> {
        self.deadline
    }

    /// Compute the next deadline given the current time.
    pub fn advance(&mut self, now: MonotonicInstant) -> Step {
        let step = match self.deadline {
            None => Step {
                deadline: MonotonicInstant::from_parts(now.secs() + 1, self.first_offset_ns),
                overrun: None,
            },
            Some(previous) => {
                let next = previous.add_nanos(self.period_ns);
                if now > next {
                    Step {
                        deadline: now.add_nanos(self.period_ns),
                        overrun: Some(Overrun { now, missed: next }),
                    }
                } else {
                    Step {
                        deadline: next,
                        overrun: None,
                    }
                }
            }
        };
        self.deadline = Some(step.deadline);
        step
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics, owned by the RT thread.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle body duration [ns].
    pub last_cycle_ns: u64,
    /// Minimum cycle body duration [ns].
    pub min_cycle_ns: u64,
    /// Maximum cycle body duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (actual wake minus deadline).
    pub max_latency_ns: u64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: u64, latency_ns: u64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle body time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters shared between the RT thread and observers.
#[derive(Debug, Default)]
pub struct CycleCounters {
    cycles: AtomicU64,
    processed: AtomicU64,
    skipped: AtomicU64,
    overruns: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
    max_latency_ns: AtomicU64,
}

impl CycleCounters {
    /// Count a completed cycle.
    #[inline]
    pub fn record_cycle(&self, latency_ns: u64) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.max_latency_ns.fetch_max(latency_ns, Ordering::Relaxed);
    }

    /// Count a cycle that ran read/logic/write.
    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a cycle skipped because the session was being replaced.
    #[inline]
    pub fn record_skipped(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count an overrun. Returns the new total.
    #[inline]
    pub fn record_overrun(&self) -> u64 {
        self.overruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a failed input read. Returns the new total.
    #[inline]
    pub fn record_read_failure(&self) -> u64 {
        self.read_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a failed output write. Returns the new total.
    #[inline]
    pub fn record_write_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Point-in-time copy.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            max_latency_ns: self.max_latency_ns.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`CycleCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Cycles completed.
    pub cycles: u64,
    /// Cycles that ran read/logic/write.
    pub processed: u64,
    /// Cycles skipped during a session change.
    pub skipped: u64,
    /// Overruns.
    pub overruns: u64,
    /// Failed input reads.
    pub read_failures: u64,
    /// Failed output writes.
    pub write_failures: u64,
    /// Worst wake latency [ns].
    pub max_latency_ns: u64,
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles={} processed={} skipped={} overruns={} read_failures={} write_failures={} max_latency={}ns",
            self.cycles,
            self.processed,
            self.skipped,
            self.overruns,
            self.read_failures,
            self.write_failures,
            self.max_latency_ns
        )
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Stack prefault depth. Must stay below the RT thread's stack size.
pub const PREFAULT_STACK_BYTES: usize = 256 * 1024;

/// Stack size of the RT thread.
pub const RT_STACK_BYTES: usize = 4 * PREFAULT_STACK_BYTES;

const_assert!(PREFAULT_STACK_BYTES < RT_STACK_BYTES);

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch the stack so the loop never takes a page fault on it.
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_STACK_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` is a valid sched_param; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup for the calling thread.
pub fn rt_setup(config: &CycleConfig) -> Result<(), CycleError> {
    if config.lock_memory {
        rt_mlockall()?;
    }
    prefault_stack();
    if let Some(cpu) = config.cpu_core {
        rt_set_affinity(cpu)?;
    }
    rt_set_scheduler(config.rt_priority)?;
    Ok(())
}

// ─── Executor ───────────────────────────────────────────────────────

/// The cyclic executor. Runs on the RT thread.
///
/// Processing is toggled through the shared session; the clock keeps
/// ticking regardless.
pub struct CyclicExecutor<C: CycleClock> {
    clock: C,
    scheduler: CycleScheduler,
    shared: Arc<SharedSession>,
    stats: CycleStats,
}

impl<C: CycleClock> CyclicExecutor<C> {
    /// Executor over `shared`, paced by `clock`.
    pub fn new(clock: C, scheduler: CycleScheduler, shared: Arc<SharedSession>) -> Self {
        Self {
            clock,
            scheduler,
            shared,
            stats: CycleStats::new(),
        }
    }

    /// Timing statistics so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Run one cycle: schedule, sleep, process.
    pub fn tick(&mut self) -> Result<Step, CycleError> {
        let now = self.clock.now()?;
        let step = self.scheduler.advance(now);

        if let Some(overrun) = step.overrun {
            self.stats.overruns += 1;
            let count = self.shared.counters().record_overrun();
            if should_log(count) {
                error!(
                    "Realtime violation #{count}: current time {} > deadline {}",
                    overrun.now, overrun.missed
                );
            }
        }

        self.clock.sleep_until(step.deadline)?;
        let woke = self.clock.now()?;
        let latency_ns = woke.saturating_since(step.deadline);

        self.shared.run_cycle();

        let done = self.clock.now()?;
        self.stats.record(done.saturating_since(woke), latency_ns);
        self.shared.counters().record_cycle(latency_ns);
        Ok(step)
    }

    /// Tick until `alive` clears. Returns the final statistics.
    ///
    /// # Errors
    /// Clock failure ends the loop.
    pub fn run(mut self, alive: &AtomicBool) -> Result<CycleStats, CycleError> {
        info!(
            "RT cycle loop started (period {} µs)",
            self.scheduler.period_ns() / 1000
        );
        while alive.load(Ordering::Acquire) {
            if let Err(e) = self.tick() {
                error!("RT cycle loop stopped: {e}");
                return Err(e);
            }
        }
        info!(
            "RT cycle loop finished: cycles={} overruns={} avg={}ns max={}ns max_latency={}ns",
            self.stats.cycle_count,
            self.stats.overruns,
            self.stats.avg_cycle_ns(),
            self.stats.max_cycle_ns,
            self.stats.max_latency_ns
        );
        Ok(self.stats)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn first_deadline_is_next_second_plus_offset() {
        let mut sched = CycleScheduler::new(Duration::from_millis(1), 450_000);
        let step = sched.advance(MonotonicInstant::from_parts(41, 999_999_999));
        assert_eq!(step.deadline, MonotonicInstant::from_parts(42, 450_000));
        assert!(step.overrun.is_none());
    }

    #[test]
    fn deadlines_advance_by_period() {
        let mut sched = CycleScheduler::new(Duration::from_millis(1), 0);
        let first = sched.advance(MonotonicInstant::from_parts(5, 0)).deadline;
        let second = sched.advance(first).deadline;
        let third = sched.advance(second.add_nanos(MS / 2)).deadline;
        assert_eq!(second.saturating_since(first), MS);
        assert_eq!(third.saturating_since(first), 2 * MS);
    }

    #[test]
    fn overrun_resynchronizes_to_now_plus_period() {
        let mut sched = CycleScheduler::new(Duration::from_millis(1), 0);
        let first = sched.advance(MonotonicInstant::from_parts(5, 0)).deadline;
        let late = first.add_nanos(3 * MS);
        let step = sched.advance(late);
        assert_eq!(step.deadline, late.add_nanos(MS));
        assert_eq!(
            step.overrun,
            Some(Overrun {
                now: late,
                missed: first.add_nanos(MS),
            })
        );
    }

    #[test]
    fn instant_display() {
        let t = MonotonicInstant::from_parts(12, 450_000);
        assert_eq!(t.to_string(), "12 sec 450000 nsec");
    }

    #[test]
    fn log_throttle() {
        assert!((1..=10).all(should_log));
        assert!(!should_log(11));
        assert!(!should_log(999));
        assert!(should_log(1000));
        assert!(should_log(3000));
    }

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(500_000, 1_000);
        stats.record(600_000, 500);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 600_000);
        assert_eq!(stats.max_latency_ns, 1_000);
        assert_eq!(stats.avg_cycle_ns(), 550_000);
    }

    #[test]
    fn rt_setup_without_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        {
            assert!(rt_setup(&CycleConfig::default()).is_ok());
        }
    }

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock;
        let a = clock.now().unwrap();
        clock.sleep_until(a.add_nanos(MS)).unwrap();
        let b = clock.now().unwrap();
        assert!(b.saturating_since(a) >= MS);
    }
}
