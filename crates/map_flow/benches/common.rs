use std::time::Duration;

use criterion::{Criterion, Throughput};
use glam::Vec2;
use map_flow::field::VectorField;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// Noisy field in `[-8, 8]` per channel.
pub fn noise_field(width: usize, height: usize, seed: u64) -> VectorField {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut unit = move || (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0) * 16.0 - 8.0;
    VectorField::from_fn(width, height, |_, _| Vec2::new(unit(), unit()))
}

/// Counter-clockwise vortex around the field center.
#[allow(dead_code)]
pub fn vortex_field(width: usize, height: usize) -> VectorField {
    let center = Vec2::new(width as f32, height as f32) * 0.5;
    VectorField::from_fn(width, height, |x, y| {
        let d = Vec2::new(x as f32, y as f32) - center;
        Vec2::new(-d.y, d.x) * 0.1 + Vec2::new(1.0, 0.0)
    })
}
