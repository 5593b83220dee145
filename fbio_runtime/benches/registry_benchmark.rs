//! Registry read/write path benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use fbio::io::config::sample_layouts;
use fbio::io::IoConfig;
use fbio_frame::{AccessMode, FrameHandle, FrameId, LocalFrameProvider};
use fbio_runtime::cycle::CycleCounters;
use fbio_runtime::logic::SampleLogic;
use fbio_runtime::registry::IoRegistry;
use fbio_runtime::session::Session;
use std::hint::black_box;
use std::sync::Arc;

fn provider() -> Arc<LocalFrameProvider> {
    Arc::new(LocalFrameProvider::from_layouts(&sample_layouts("DeviceBus", "1:IN", "1:OUT")).unwrap())
}

/// Benchmark extracting every input point from a raw frame
fn bench_read_all(c: &mut Criterion) {
    let provider = provider();
    let input = FrameHandle::acquire(provider.clone(), FrameId::new("DeviceBus", "1:IN"), AccessMode::Read).unwrap();
    let output = FrameHandle::acquire(provider, FrameId::new("DeviceBus", "1:OUT"), AccessMode::Write).unwrap();
    let registry = IoRegistry::build(&IoConfig::default(), &input, &output);
    let frame = [0x5Au8; 8];

    c.bench_function("registry_read_all", |b| {
        b.iter(|| registry.inputs.read_all(black_box(&frame)));
    });
}

/// Benchmark bit-level read-modify-write of every output point
fn bench_write_all(c: &mut Criterion) {
    let provider = provider();
    let input = FrameHandle::acquire(provider.clone(), FrameId::new("DeviceBus", "1:IN"), AccessMode::Read).unwrap();
    let output = FrameHandle::acquire(provider, FrameId::new("DeviceBus", "1:OUT"), AccessMode::Write).unwrap();
    let registry = IoRegistry::build(&IoConfig::default(), &input, &output);
    let mut frame = [0u8; 8];

    c.bench_function("registry_write_all", |b| {
        b.iter(|| {
            registry.outputs.write_all(black_box(&mut frame));
            black_box(frame[0]);
        });
    });
}

/// Benchmark one full cycle body: scoped read, logic, scoped write
fn bench_session_cycle(c: &mut Criterion) {
    let session = Session::open(provider(), &IoConfig::default(), &SampleLogic::default()).unwrap();
    let counters = CycleCounters::default();

    c.bench_function("session_run_cycle", |b| {
        b.iter(|| session.run_cycle(black_box(&counters)));
    });
}

criterion_group!(benches, bench_read_all, bench_write_all, bench_session_cycle);
criterion_main!(benches);
