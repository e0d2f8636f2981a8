mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use map_flow::field::FieldSmoother;

const SIZES: [usize; 3] = [128, 256, 512];
const SIGMAS: [f32; 4] = [0.5, 1.0, 3.0, 6.0];

fn smoothing_sigma_benches(c: &mut Criterion) {
    for &size in &SIZES {
        let mut group = c.benchmark_group(format!("smoothing/{size}x{size}"));
        let field = common::noise_field(size, size, 0x5EED_u64 ^ size as u64);
        group.throughput(common::elements_throughput(size * size));

        for &sigma in &SIGMAS {
            let smoother = FieldSmoother::new(sigma);
            group.bench_with_input(BenchmarkId::from_parameter(sigma), &sigma, |b, _| {
                b.iter(|| {
                    let smoothed = smoother.smooth(&field).unwrap();
                    black_box(smoothed.samples().len());
                });
            });
        }

        group.finish();
    }
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = smoothing_sigma_benches
}
criterion_main!(benches);
