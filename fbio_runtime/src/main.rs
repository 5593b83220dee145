//! # Fieldbus I/O Runtime
//!
//! Runs the cyclic I/O runtime against the simulated host: a local frame
//! provider, a pattern-driven fieldbus producer, an in-process subscription
//! provider and a static device status. The host lifecycle is driven from
//! here: `StartWarm` at startup, `Stop` on Ctrl-C.

use clap::Parser;
use fbio::config::LogLevel;
use fbio::lifecycle::PlcOperation;
use fbio_runtime::Runtime;
use fbio_runtime::config::RuntimeConfig;
use fbio_runtime::sim::Simulation;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Fieldbus I/O Runtime: cyclic read/logic/write over fieldbus frames
#[derive(Parser, Debug)]
#[command(name = "fbio_runtime")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Deterministic fieldbus I/O cycle with diagnostic and subscription loops")]
struct Args {
    /// Path to the runtime configuration TOML.
    #[arg(long, default_value = fbio::consts::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// CPU core to pin the RT thread to (overrides [cycle].cpu_core).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// SCHED_FIFO priority (overrides [cycle].rt_priority).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Loaded before tracing is up so `shared.log_level` applies.
    let config = RuntimeConfig::load_or_default(&args.config);
    let level = match &config {
        Ok(config) => config.shared.log_level,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(&args, level);

    info!("Fieldbus I/O Runtime v{} starting...", env!("CARGO_PKG_VERSION"));
    if !args.config.exists() {
        warn!("Config {} not found, using defaults", args.config.display());
    }

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Fieldbus I/O Runtime shutdown complete");
}

fn run(args: &Args, mut config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(core) = args.cpu_core {
        config.cycle.cpu_core = Some(core);
    }
    if let Some(priority) = args.rt_priority {
        config.cycle.rt_priority = priority;
    }
    fbio::config::Validate::validate(&config)?;

    info!(
        "Config OK: service={}, cycle={}µs, {} points, {} subscribed variables",
        config.shared.service_name,
        config.cycle.period_us,
        config.io.points.len(),
        config.subscription.variables.len()
    );

    let simulation = Simulation::from_config(&config)?;
    let fieldbus = simulation.fieldbus(&config)?;
    let runtime = Arc::new(Runtime::new(config, simulation.services()));
    let on_operation = runtime.operation_handler();

    // Setup signal handler for graceful shutdown.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let producer = {
        let running = running.clone();
        thread::Builder::new()
            .name("fbio-sim".into())
            .spawn(move || fieldbus.run(&running))?
    };

    if !on_operation(PlcOperation::StartWarm) {
        running.store(false, Ordering::SeqCst);
        producer.thread().unpark();
        let _ = producer.join();
        runtime.shutdown();
        return Err("StartWarm failed".into());
    }

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    on_operation(PlcOperation::Stop);
    producer.thread().unpark();
    if producer.join().is_err() {
        error!("Simulated fieldbus thread panicked");
    }
    runtime.shutdown();
    Ok(())
}

fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse::<Directive>().unwrap_or_else(|_| Level::INFO.into()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
