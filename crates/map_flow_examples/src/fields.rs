use std::sync::Arc;

use glam::Vec2;
use map_flow::prelude::*;

/// Counter-clockwise vortex around the raster center with a constant drift to the east.
pub fn vortex_field(width: usize, height: usize, strength: f32) -> VectorField {
    let center = Vec2::new(width as f32, height as f32) * 0.5;
    VectorField::from_fn(width, height, |x, y| {
        let d = Vec2::new(x as f32, y as f32) - center;
        Vec2::new(-d.y, d.x) * strength + Vec2::new(1.0, 0.0)
    })
}

/// White noise in `[-amplitude, amplitude]` per channel.
pub fn noise_field(width: usize, height: usize, amplitude: f32, seed: u64) -> VectorField {
    let mut rng = DeterministicRandom::new(seed);
    VectorField::from_fn(width, height, |_, _| {
        let u = rng.next_f32() * 2.0 - 1.0;
        let v = rng.next_f32() * 2.0 - 1.0;
        Vec2::new(u, v) * amplitude
    })
}

/// A source sampling a steady double gyre defined in map coordinates.
///
/// Cells are sampled at their centers, row 0 at the top of the requested extent. The map
/// velocity is flipped on the y axis because raster rows grow downwards.
pub fn gyre_source(period: f64, speed: f32) -> Arc<dyn FieldSource> {
    Arc::new(FnSource::new(move |request: &FieldRequest| {
        let extent = request.extent;
        let dx = extent.width() / request.width as f64;
        let dy = extent.height() / request.height as f64;
        let k = std::f64::consts::PI / period;
        Ok(VectorField::from_fn(request.width, request.height, |ix, iy| {
            let x = extent.xmin + (ix as f64 + 0.5) * dx;
            let y = extent.ymax - (iy as f64 + 0.5) * dy;
            let u = -(k * x).sin() * (k * y).cos();
            let v = (k * x).cos() * (k * y).sin();
            Vec2::new(u as f32, -(v as f32)) * speed
        }))
    }))
}
