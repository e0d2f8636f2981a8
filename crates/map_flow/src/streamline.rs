//! Streamline integration through a (smoothed) vector field.
//!
//! Streamlines are traced with fixed-length forward Euler steps. Each vertex carries the
//! cumulative integration time since the seed, which the mesh builder turns into animation
//! attributes.
use glam::Vec2;

use crate::config::FlowConfig;
use crate::error::Result;
use crate::field::FieldSample;
use crate::offload::rest::RestPoint;
use crate::random::DeterministicRandom;

/// A single traced vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamlineVertex {
    /// Position in field pixels.
    pub position: Vec2,
    /// Integration time since the seed.
    pub time: f32,
}

/// An ordered, timestamped polyline with at least one vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct Streamline {
    vertices: Vec<StreamlineVertex>,
}

impl Streamline {
    /// Start a streamline at `seed` with time zero.
    pub fn from_seed(seed: Vec2) -> Self {
        Self {
            vertices: vec![StreamlineVertex {
                position: seed,
                time: 0.0,
            }],
        }
    }

    /// Build a streamline from explicit vertices. Returns `None` for an empty list.
    pub fn from_vertices(vertices: Vec<StreamlineVertex>) -> Option<Self> {
        if vertices.is_empty() {
            None
        } else {
            Some(Self { vertices })
        }
    }

    pub fn vertices(&self) -> &[StreamlineVertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Time of the last vertex.
    pub fn total_time(&self) -> f32 {
        self.vertices.last().map_or(0.0, |v| v.time)
    }

    fn push(&mut self, position: Vec2, time: f32) {
        self.vertices.push(StreamlineVertex { position, time });
    }
}

/// Forward Euler streamline tracer.
#[derive(Clone, Debug)]
pub struct StreamlineTracer {
    /// Distance advanced per step.
    pub segment_length: f32,
    /// Maximum number of steps after the seed.
    pub max_steps: usize,
    /// Tracing stops when the sampled speed is below this value.
    pub min_speed: f32,
}

impl StreamlineTracer {
    pub fn new(segment_length: f32, max_steps: usize, min_speed: f32) -> Self {
        Self {
            segment_length,
            max_steps,
            min_speed,
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(config.segment_length, config.max_steps, config.min_speed)
    }

    /// Trace a single streamline starting at `seed`.
    pub fn trace(&self, field: &impl FieldSample, seed: Vec2) -> Streamline {
        let mut line = Streamline::from_seed(seed);
        let mut position = seed;
        let mut time = 0.0f32;

        for _ in 0..self.max_steps {
            let velocity = field.sample(position.x, position.y);
            let speed = velocity.length();
            if !(speed >= self.min_speed) || speed == 0.0 {
                break;
            }
            position += velocity / speed * self.segment_length;
            time += self.segment_length / speed;
            line.push(position, time);
        }

        line
    }

    /// Trace `count` streamlines from seeds spread uniformly over the field's pixel extent.
    ///
    /// Seeds are drawn from `rng` as `(rng() * width, rng() * height)`. The rest point is
    /// consulted before every trace, so a cancelled batch stops early with
    /// [`crate::error::Error::Cancelled`].
    pub fn trace_batch(
        &self,
        field: &impl FieldSample,
        count: usize,
        rng: &mut DeterministicRandom,
        rest: &mut RestPoint<'_>,
    ) -> Result<Vec<Streamline>> {
        let (w, h) = field.size();
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            rest.check()?;
            let x = rng.next_f32() * w as f32;
            let y = rng.next_f32() * h as f32;
            lines.push(self.trace(field, Vec2::new(x, y)));
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::Error;
    use crate::field::VectorField;

    #[test]
    fn zero_field_yields_only_the_seed() {
        let field = VectorField::constant(16, 16, Vec2::ZERO);
        let tracer = StreamlineTracer::new(1.0, 100, 0.001);
        for seed in [Vec2::new(0.0, 0.0), Vec2::new(7.3, 2.2), Vec2::new(-4.0, 99.0)] {
            let line = tracer.trace(&field, seed);
            assert_eq!(line.len(), 1);
            assert_eq!(line.vertices()[0].position, seed);
            assert_eq!(line.total_time(), 0.0);
        }
    }

    #[test]
    fn constant_field_gives_evenly_spaced_vertices() {
        let field = VectorField::constant(128, 4, Vec2::new(1.0, 0.0));
        let tracer = StreamlineTracer::new(1.0, 100, 0.001);
        let line = tracer.trace(&field, Vec2::ZERO);
        assert_eq!(line.len(), 101);
        for (i, v) in line.vertices().iter().enumerate() {
            assert_eq!(v.position, Vec2::new(i as f32, 0.0));
            assert_eq!(v.time, i as f32);
        }
        assert_eq!(line.total_time(), 100.0);
    }

    #[test]
    fn step_time_scales_with_inverse_speed() {
        let field = VectorField::constant(64, 64, Vec2::new(0.0, 4.0));
        let tracer = StreamlineTracer::new(2.0, 3, 0.001);
        let line = tracer.trace(&field, Vec2::new(1.0, 1.0));
        assert_eq!(line.len(), 4);
        assert_eq!(line.vertices()[3].position, Vec2::new(1.0, 7.0));
        assert_eq!(line.total_time(), 1.5);
    }

    #[test]
    fn stops_when_leaving_the_field() {
        let field = VectorField::constant(5, 1, Vec2::new(1.0, 0.0));
        let tracer = StreamlineTracer::new(1.0, 100, 0.001);
        let line = tracer.trace(&field, Vec2::ZERO);
        // Positions 0..=4 sample inside, position 5 samples (0, 0).
        assert_eq!(line.len(), 6);
    }

    #[test]
    fn batch_is_deterministic_and_sized() {
        let field = VectorField::constant(32, 32, Vec2::new(0.5, 0.5));
        let tracer = StreamlineTracer::new(1.0, 10, 0.001);
        let token = CancellationToken::new();

        let mut rest = RestPoint::new(&token, Duration::from_secs(60));
        let a = tracer
            .trace_batch(&field, 20, &mut DeterministicRandom::new(3), &mut rest)
            .unwrap();
        let b = tracer
            .trace_batch(&field, 20, &mut DeterministicRandom::new(3), &mut rest)
            .unwrap();
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        for line in &a {
            let seed = line.vertices()[0].position;
            assert!((0.0..32.0).contains(&seed.x) && (0.0..32.0).contains(&seed.y));
        }
    }

    #[test]
    fn cancelled_batch_stops() {
        let field = VectorField::constant(8, 8, Vec2::X);
        let tracer = StreamlineTracer::new(1.0, 10, 0.001);
        let token = CancellationToken::new();
        token.cancel();
        let mut rest = RestPoint::new(&token, Duration::from_secs(60));
        let result = tracer.trace_batch(&field, 1000, &mut DeterministicRandom::default(), &mut rest);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
