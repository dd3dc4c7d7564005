//! Graph Mutation Benchmarks
//!
//! Structural changes happen on the control thread while the host renders.
//! They must stay cheap enough that a drag gesture (dozens of connect,
//! disconnect and parameter calls per frame) never stalls the UI.
//!
//! ```text
//! frame budget at 60 fps = 16.7 ms
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use patchweave::prelude::*;

// ============================================================================
// Constants
// ============================================================================

const GRAPH_SIZES: [u64; 4] = [8, 32, 128, 512];
const SAMPLE_RATE: f64 = 48000.0;

// ============================================================================
// Helper Functions
// ============================================================================

fn config() -> EngineConfig {
    EngineConfig::new(SAMPLE_RATE)
        .with_seed(42)
        .with_noise_seconds(0.25)
        .with_impulse_seconds(0.25)
}

fn empty_graph() -> AudioGraph<OfflineHost> {
    AudioGraph::new(OfflineHost::new(SAMPLE_RATE), config())
}

/// Pairs of (generator, lowpass) with every generator chained into its filter
fn chained_graph(pairs: u64) -> AudioGraph<OfflineHost> {
    let mut graph = empty_graph();
    for i in 0..pairs {
        let generator = NodeId(i * 2);
        let filter = NodeId(i * 2 + 1);
        graph
            .create_generator(generator, GeneratorType::Sawtooth, 110.0, 0.3, true)
            .unwrap();
        graph
            .create_processor(filter, ProcessorType::Lowpass)
            .unwrap();
        graph.connect(generator, filter).unwrap();
    }
    graph
}

// ============================================================================
// Node Lifecycle
// ============================================================================

fn bench_create_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    for subtype in [
        ProcessorType::Lowpass,
        ProcessorType::Phaser,
        ProcessorType::Distortion,
    ] {
        group.bench_with_input(
            BenchmarkId::new("create_remove", subtype.name()),
            &subtype,
            |b, &subtype| {
                let mut graph = empty_graph();
                b.iter(|| {
                    graph.create_processor(NodeId(1), subtype).unwrap();
                    graph.remove_node(black_box(NodeId(1))).unwrap();
                });
            },
        );
    }

    group.bench_function("set_subtype", |b| {
        let mut graph = chained_graph(1);
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let subtype = if flip {
                GeneratorType::Square
            } else {
                GeneratorType::Sawtooth
            };
            graph.set_subtype(NodeId(0), subtype.into()).unwrap();
        });
    });

    group.finish();
}

// ============================================================================
// Routing
// ============================================================================

fn bench_connect_disconnect(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");

    for size in GRAPH_SIZES {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("audio_chain", size), &size, |b, &size| {
            let mut graph = chained_graph(size);
            graph.disconnect(NodeId(0), NodeId(1)).unwrap();
            b.iter(|| {
                graph.connect(NodeId(0), NodeId(1)).unwrap();
                graph.disconnect(black_box(NodeId(0)), NodeId(1)).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("modulation", size), &size, |b, &size| {
            let mut graph = chained_graph(size);
            let lfo = NodeId(size * 2);
            graph
                .create_generator(lfo, GeneratorType::Sine, 0.5, 0.5, false)
                .unwrap();
            b.iter(|| {
                graph.connect(lfo, NodeId(1)).unwrap();
                graph.disconnect(black_box(lfo), NodeId(1)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_audible_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing/audible");

    for fan_out in [1u64, 8, 32] {
        group.bench_with_input(BenchmarkId::new("toggle", fan_out), &fan_out, |b, &fan_out| {
            let mut graph = empty_graph();
            graph
                .create_generator(NodeId(0), GeneratorType::Sine, 220.0, 0.5, true)
                .unwrap();
            for i in 1..=fan_out {
                graph
                    .create_processor(NodeId(i), ProcessorType::Bandpass)
                    .unwrap();
                graph.connect(NodeId(0), NodeId(i)).unwrap();
            }
            let mut audible = true;
            b.iter(|| {
                audible = !audible;
                graph.set_audible(NodeId(0), black_box(audible)).unwrap();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Parameters and Events
// ============================================================================

fn bench_parameters(c: &mut Criterion) {
    let mut group = c.benchmark_group("parameters");

    group.bench_function("smoothed_cutoff", |b| {
        let mut graph = chained_graph(1);
        let mut cutoff = 200.0;
        b.iter(|| {
            cutoff = if cutoff > 8000.0 { 200.0 } else { cutoff * 1.1 };
            graph.set_param(NodeId(1), "cutoff", black_box(cutoff)).unwrap();
        });
    });

    group.bench_function("distortion_curve", |b| {
        let mut graph = empty_graph();
        graph
            .create_processor(NodeId(1), ProcessorType::Distortion)
            .unwrap();
        let mut amount = 0.0;
        b.iter(|| {
            amount = (amount + 7.0) % 400.0;
            graph.set_param(NodeId(1), "amount", black_box(amount)).unwrap();
        });
    });

    group.bench_function("noise_morph", |b| {
        let mut graph = empty_graph();
        graph
            .create_generator(NodeId(1), GeneratorType::Noise, 20.0, 0.5, true)
            .unwrap();
        let mut frequency = 20.0;
        b.iter(|| {
            frequency = if frequency > 20000.0 { 20.0 } else { frequency * 1.5 };
            graph
                .set_param(NodeId(1), "frequency", black_box(frequency))
                .unwrap();
        });
    });

    group.finish();
}

fn bench_disturbance(c: &mut Criterion) {
    let mut group = c.benchmark_group("events");

    group.bench_function("disturbance_full", |b| {
        let mut graph = chained_graph(1);
        let settings = DisturbanceSettings::default();
        b.iter(|| {
            graph
                .trigger_disturbance(NodeId(1), black_box(6.0), 0.3, &settings)
                .unwrap();
            // Let the host reclaim expired clusters
            graph.host_mut().advance(2.0);
        });
    });

    group.finish();
}

// ============================================================================
// Synthesis Tables
// ============================================================================

fn bench_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("tables");

    for samples in [1024usize, 4096, 16384] {
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::new("bitcrush", samples), &samples, |b, &n| {
            b.iter(|| bitcrush_curve(black_box(6.0), n));
        });
        group.bench_with_input(BenchmarkId::new("distortion", samples), &samples, |b, &n| {
            b.iter(|| distortion_curve(black_box(50.0), n));
        });
    }

    group.bench_function("noise_bank_1s", |b| {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        b.iter(|| NoiseBank::generate(black_box(SAMPLE_RATE as usize), &mut rng));
    });

    group.finish();
}

criterion_group!(
    lifecycle_benches,
    bench_create_remove,
);

criterion_group!(
    routing_benches,
    bench_connect_disconnect,
    bench_audible_toggle,
);

criterion_group!(parameter_benches, bench_parameters, bench_disturbance,);

criterion_group!(table_benches, bench_tables,);

criterion_main!(
    lifecycle_benches,
    routing_benches,
    parameter_benches,
    table_benches,
);
