mod common;

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use map_flow::config::FlowConfig;
use map_flow::mesh::RibbonMeshBuilder;
use map_flow::offload::build_mesh;
use map_flow::offload::rest::RestPoint;
use map_flow::random::DeterministicRandom;
use map_flow::streamline::StreamlineTracer;
use tokio_util::sync::CancellationToken;

const COUNTS: [usize; 4] = [500, 1000, 2500, 5000];

fn trace_benches(c: &mut Criterion) {
    let field = common::vortex_field(512, 512);
    let tracer = StreamlineTracer::new(1.0, 100, 0.001);
    let token = CancellationToken::new();

    let mut group = c.benchmark_group("mesh/trace_batch");
    for &count in &COUNTS {
        group.throughput(common::elements_throughput(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut rest = RestPoint::new(&token, Duration::from_secs(60));
                let lines = tracer
                    .trace_batch(&field, count, &mut DeterministicRandom::default(), &mut rest)
                    .unwrap();
                black_box(lines.len());
            });
        });
    }
    group.finish();
}

fn tessellate_benches(c: &mut Criterion) {
    let field = common::vortex_field(512, 512);
    let tracer = StreamlineTracer::new(1.0, 100, 0.001);
    let builder = RibbonMeshBuilder::new(100.0);
    let token = CancellationToken::new();

    let mut group = c.benchmark_group("mesh/tessellate");
    for &count in &COUNTS {
        let mut rest = RestPoint::new(&token, Duration::from_secs(60));
        let lines = tracer
            .trace_batch(&field, count, &mut DeterministicRandom::default(), &mut rest)
            .unwrap();
        let segments: usize = lines.iter().map(|l| l.len() - 1).sum();
        group.throughput(common::elements_throughput(segments));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mesh = builder.build(&lines, &mut DeterministicRandom::default());
                black_box(mesh.indices.len());
            });
        });
    }
    group.finish();
}

fn pipeline_benches(c: &mut Criterion) {
    let field = common::noise_field(384, 256, 0xF10E);
    let token = CancellationToken::new();

    let mut group = c.benchmark_group("mesh/pipeline");
    for &count in &COUNTS {
        let config = FlowConfig::new().with_streamline_count(count);
        group.throughput(common::elements_throughput(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mesh = build_mesh(&field, config.smoothing, &config, &token).unwrap();
                black_box(mesh.vertices.len());
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = trace_benches, tessellate_benches, pipeline_benches
}
criterion_main!(benches);
