//! Lifecycle context.
//!
//! [`Runtime`] owns everything the host lifecycle callback acts on: the
//! host services, the shared session, the subscription worker and the
//! three loop threads. Independent instances can coexist; the callback is
//! a closure over an `Arc<Runtime>` ([`Runtime::operation_handler`]).
//!
//! ```text
//!  StartCold/Warm/Hot ─► init (once) ─► start_processing
//!  Stop/Reset/Unload  ─► stop_processing
//!  Load/Setup/None    ─► logged
//! ```
//!
//! Threads:
//!
//! | Thread            | Priority            | Shares                       |
//! |-------------------|---------------------|------------------------------|
//! | `fbio-rt`         | SCHED_FIFO (config) | session (try_read), counters |
//! | `fbio-diagnostic` | default             | session (read), counters     |
//! | `fbio-subscribe`  | default             | subscription worker only     |

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use fbio::config::Validate;
use fbio::io::PortName;
use fbio::lifecycle::{LifecycleAction, PlcOperation};
use fbio::variant::Variant;
use fbio_frame::FrameProvider;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::cycle::{
    CounterSnapshot, CycleClock, CycleError, CycleScheduler, CycleStats, CyclicExecutor, MonotonicClock,
    RT_STACK_BYTES, rt_setup,
};
use crate::device::{DeviceStatus, DeviceStatusProvider};
use crate::diagnostic::{DiagnosticLoop, DiagnosticRecord, snapshot};
use crate::error::RuntimeError;
use crate::logic::{CycleLogic, SampleLogic};
use crate::session::{Session, SharedSession, probe_system_variables};
use crate::subscription::{SubscriptionProvider, SubscriptionWorker};

/// Host services the runtime consumes.
#[derive(Clone)]
pub struct Services {
    /// Fieldbus frames.
    pub frames: Arc<dyn FrameProvider>,
    /// Process-variable subscriptions.
    pub subscriptions: Arc<dyn SubscriptionProvider>,
    /// Device status items.
    pub device_status: Arc<dyn DeviceStatusProvider>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

struct Workers {
    rt: JoinHandle<Result<CycleStats, CycleError>>,
    diagnostic: JoinHandle<()>,
    subscription: JoinHandle<()>,
}

impl Workers {
    fn unpark(&self) {
        self.rt.thread().unpark();
        self.diagnostic.thread().unpark();
        self.subscription.thread().unpark();
    }
}

type ClockFactory = Box<dyn Fn() -> Box<dyn CycleClock> + Send + Sync>;

/// The fieldbus I/O runtime.
pub struct Runtime {
    config: RuntimeConfig,
    services: Services,
    logic: Box<dyn CycleLogic>,
    clock: ClockFactory,
    shared: Arc<SharedSession>,
    subscription: Arc<SubscriptionWorker>,
    alive: Arc<AtomicBool>,
    workers: Mutex<Option<Workers>>,
    lifecycle: Mutex<()>,
    device: Mutex<Option<DeviceStatus>>,
}

impl Runtime {
    /// Runtime with the sample logic and the monotonic clock. Nothing
    /// starts until [`Self::init`].
    pub fn new(config: RuntimeConfig, services: Services) -> Self {
        let subscription = Arc::new(SubscriptionWorker::new(
            services.subscriptions.clone(),
            config.subscription.clone(),
        ));
        let logic = Box::new(SampleLogic::new(config.logic.clone()));
        Self {
            config,
            services,
            logic,
            clock: Box::new(|| Box::new(MonotonicClock) as Box<dyn CycleClock>),
            shared: Arc::new(SharedSession::new()),
            subscription,
            alive: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(None),
            lifecycle: Mutex::new(()),
            device: Mutex::new(None),
        }
    }

    /// Replace the cycle logic.
    pub fn with_logic(mut self, logic: impl CycleLogic + 'static) -> Self {
        self.logic = Box::new(logic);
        self
    }

    /// Replace the RT clock. Every [`Self::init`] runs on a clone of it.
    pub fn with_clock(mut self, clock: impl CycleClock + Clone + Sync + 'static) -> Self {
        self.clock = Box::new(move || Box::new(clock.clone()) as Box<dyn CycleClock>);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Validate the configuration, read the device status and start the
    /// three loops. Later calls return `Ok` until [`Self::shutdown`].
    ///
    /// # Errors
    /// Invalid configuration, RT setup failure or a thread that cannot be
    /// spawned.
    pub fn init(&self) -> Result<(), RuntimeError> {
        let mut workers = self.workers.lock();
        if workers.is_some() {
            debug!("Runtime already initialized");
            return Ok(());
        }
        self.config.validate()?;

        *self.device.lock() = Some(DeviceStatus::read(self.services.device_status.as_ref()));

        self.alive.store(true, Ordering::Release);
        let rt = match self.spawn_rt() {
            Ok(rt) => rt,
            Err(e) => {
                self.alive.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let diagnostic = {
            let diag = DiagnosticLoop::new(self.shared.clone(), self.config.diagnostic.clone());
            let alive = self.alive.clone();
            spawn("fbio-diagnostic", move || diag.run(&alive))
        };
        let subscription = {
            let worker = self.subscription.clone();
            let alive = self.alive.clone();
            spawn("fbio-subscribe", move || worker.run(&alive))
        };

        match (diagnostic, subscription) {
            (Ok(diagnostic), Ok(subscription)) => {
                *workers = Some(Workers {
                    rt,
                    diagnostic,
                    subscription,
                });
                info!("Runtime initialized");
                Ok(())
            }
            (diagnostic, subscription) => {
                self.alive.store(false, Ordering::Release);
                rt.thread().unpark();
                let _ = rt.join();
                let mut first_error = None;
                for result in [diagnostic, subscription] {
                    match result {
                        Ok(handle) => {
                            handle.thread().unpark();
                            let _ = handle.join();
                        }
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Err(first_error.unwrap_or(RuntimeError::ThreadExited("runtime")))
            }
        }
    }

    fn spawn_rt(&self) -> Result<JoinHandle<Result<CycleStats, CycleError>>, RuntimeError> {
        let clock = (self.clock)();
        let cycle = self.config.cycle.clone();
        let shared = self.shared.clone();
        let alive = self.alive.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("fbio-rt".into())
            .stack_size(RT_STACK_BYTES)
            .spawn(move || {
                if let Err(e) = rt_setup(&cycle) {
                    let _ = ready_tx.send(Err(e.clone()));
                    return Err(e);
                }
                info!(
                    "RT setup complete (cpu_core={:?}, priority={})",
                    cycle.cpu_core, cycle.rt_priority
                );
                let _ = ready_tx.send(Ok(()));
                CyclicExecutor::new(clock, CycleScheduler::from_config(&cycle), shared).run(&alive)
            })
            .map_err(|source| RuntimeError::Spawn {
                thread: "fbio-rt",
                source,
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = handle.join();
                Err(RuntimeError::ThreadExited("fbio-rt"))
            }
        }
    }

    /// Open the subscription and a session. No-op while processing.
    ///
    /// The session is installed last, so the RT loop touches no output
    /// until every other step has succeeded.
    ///
    /// # Errors
    /// Subscription setup, frame acquisition or logic binding. Nothing
    /// stays open on failure.
    pub fn start_processing(&self) -> Result<(), RuntimeError> {
        let _lifecycle = self.lifecycle.lock();
        if self.shared.is_processing() {
            info!("Processing already running");
            return Ok(());
        }

        self.subscription.start()?;
        probe_system_variables(&self.services.frames, &self.config.io.probes);
        let session = match Session::open(self.services.frames.clone(), &self.config.io, self.logic.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                self.subscription.stop();
                return Err(e);
            }
        };
        let points = session.registry().len();
        self.shared.install(session);
        info!("Processing started ({points} points)");
        Ok(())
    }

    /// Stop processing and release the session. No-op while idle.
    ///
    /// Returns after any in-flight cycle has finished.
    pub fn stop_processing(&self) {
        let _lifecycle = self.lifecycle.lock();
        match self.shared.take() {
            Some(session) => {
                session.close();
                info!("Processing stopped");
            }
            None => debug!("Processing not running"),
        }
        self.subscription.stop();
    }

    /// React to a host operation. Returns `false` if it failed.
    pub fn handle_operation(&self, op: PlcOperation) -> bool {
        match op.action() {
            LifecycleAction::InitAndStart => {
                info!("{op}: initializing and starting processing");
                match self.init().and_then(|()| self.start_processing()) {
                    Ok(()) => true,
                    Err(e) => {
                        error!("{op} failed: {e}");
                        false
                    }
                }
            }
            LifecycleAction::Stop => {
                info!("{op}: stopping processing");
                self.stop_processing();
                true
            }
            LifecycleAction::Ignore => {
                info!("{op}");
                true
            }
        }
    }

    /// Callback for the host's operation notifications.
    pub fn operation_handler(self: &Arc<Self>) -> impl Fn(PlcOperation) -> bool + Send + Sync + 'static {
        let runtime = Arc::clone(self);
        move |op| runtime.handle_operation(op)
    }

    /// Stop processing and join every thread. Idempotent.
    pub fn shutdown(&self) {
        self.stop_processing();
        let Some(workers) = self.workers.lock().take() else {
            return;
        };
        self.alive.store(false, Ordering::Release);
        workers.unpark();

        match workers.rt.join() {
            Ok(Ok(stats)) => debug!("RT thread joined after {} cycles", stats.cycle_count),
            Ok(Err(e)) => warn!("RT thread had stopped: {e}"),
            Err(_) => error!("RT thread panicked"),
        }
        for (name, handle) in [
            ("diagnostic", workers.diagnostic),
            ("subscription", workers.subscription),
        ] {
            if handle.join().is_err() {
                error!("{name} thread panicked");
            }
        }
        info!("Runtime shut down: {}", self.counters());
    }

    // ─── Observation ────────────────────────────────────────────────

    /// True once [`Self::init`] succeeded and until shutdown.
    pub fn is_initialized(&self) -> bool {
        self.workers.lock().is_some()
    }

    /// True while the RT loop is running. False after a clock failure.
    pub fn is_cycling(&self) -> bool {
        self.workers
            .lock()
            .as_ref()
            .is_some_and(|w| !w.rt.is_finished())
    }

    /// True between start and stop of processing.
    pub fn is_processing(&self) -> bool {
        self.shared.is_processing()
    }

    /// Cycle counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters().snapshot()
    }

    /// Points registered by the current session, 0 while idle.
    pub fn registry_len(&self) -> usize {
        self.shared
            .with_session(|s| s.registry().len())
            .unwrap_or(0)
    }

    /// Current point values.
    pub fn diagnostic_snapshot(&self) -> Vec<DiagnosticRecord> {
        self.shared
            .with_session(|s| snapshot(s.registry()))
            .unwrap_or_default()
    }

    /// Last known subscription values.
    pub fn subscription_values(&self) -> Vec<(PortName, Variant)> {
        self.subscription.values()
    }

    /// Device status read at init.
    pub fn device_status(&self) -> Option<DeviceStatus> {
        self.device.lock().clone()
    }
}

fn spawn<F>(name: &'static str, body: F) -> Result<JoinHandle<()>, RuntimeError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map_err(|source| RuntimeError::Spawn {
            thread: name,
            source,
        })
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("initialized", &self.is_initialized())
            .field("processing", &self.is_processing())
            .finish_non_exhaustive()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
