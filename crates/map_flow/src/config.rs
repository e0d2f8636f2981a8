//! Tunable constants for field smoothing, streamline tracing and mesh generation.
//!
//! A [`FlowConfig`] is built once and threaded through the smoother, the tracer, the mesh
//! builder and the lifecycle manager. Tests use it to run with small deterministic values.
use std::time::Duration;

use crate::error::{Error, Result};
use crate::random::DEFAULT_SEED;

/// Configuration for generating flow meshes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowConfig {
    /// Distance advanced per integration step, in field pixels.
    pub segment_length: f32,
    /// Number of streamlines seeded per generation.
    pub streamline_count: usize,
    /// Gaussian smoothing sigma, in field pixels.
    pub smoothing: f32,
    /// Maximum integration steps per streamline.
    pub max_steps: usize,
    /// Tracing stops once the sampled speed drops below this value.
    pub min_speed: f32,
    /// Smoothed cells whose accumulated kernel weight is below this value become `(0, 0)`.
    pub min_weight: f32,
    /// Visual scaling applied to per-segment speed. Has no physical unit.
    pub speed_factor: f32,
    /// Factor by which the viewport extent is grown before fetching field data.
    pub extent_expansion: f64,
    /// Seed for streamline placement and phase jitter.
    pub seed: u64,
    /// Wall-clock slice after which long computations check for cancellation and yield.
    pub rest_interval: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            segment_length: 1.0,
            streamline_count: 5000,
            smoothing: 3.0,
            max_steps: 100,
            min_speed: 0.001,
            min_weight: 0.001,
            speed_factor: 100.0,
            extent_expansion: 1.15,
            seed: DEFAULT_SEED,
            rest_interval: Duration::from_millis(100),
        }
    }
}

impl FlowConfig {
    /// Creates a new [`FlowConfig`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the integration segment length.
    pub fn with_segment_length(mut self, segment_length: f32) -> Self {
        self.segment_length = segment_length;
        self
    }

    /// Sets the number of streamlines per generation.
    pub fn with_streamline_count(mut self, streamline_count: usize) -> Self {
        self.streamline_count = streamline_count;
        self
    }

    /// Sets the smoothing sigma.
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Sets the maximum number of integration steps.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the minimum speed below which tracing stops.
    pub fn with_min_speed(mut self, min_speed: f32) -> Self {
        self.min_speed = min_speed;
        self
    }

    /// Sets the minimum accumulated smoothing weight.
    pub fn with_min_weight(mut self, min_weight: f32) -> Self {
        self.min_weight = min_weight;
        self
    }

    /// Sets the speed scaling factor.
    pub fn with_speed_factor(mut self, speed_factor: f32) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    /// Sets the extent expansion factor.
    pub fn with_extent_expansion(mut self, extent_expansion: f64) -> Self {
        self.extent_expansion = extent_expansion;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the rest interval.
    pub fn with_rest_interval(mut self, rest_interval: Duration) -> Self {
        self.rest_interval = rest_interval;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if !(self.segment_length.is_finite() && self.segment_length > 0.0) {
            return Err(Error::InvalidConfig(
                "segment_length must be finite and > 0".into(),
            ));
        }
        if !(self.smoothing.is_finite() && self.smoothing > 0.0) {
            return Err(Error::InvalidConfig(
                "smoothing must be finite and > 0".into(),
            ));
        }
        if !(self.min_speed.is_finite() && self.min_speed >= 0.0) {
            return Err(Error::InvalidConfig("min_speed must be >= 0".into()));
        }
        if !(self.min_weight.is_finite() && self.min_weight >= 0.0) {
            return Err(Error::InvalidConfig("min_weight must be >= 0".into()));
        }
        if !self.speed_factor.is_finite() {
            return Err(Error::InvalidConfig("speed_factor must be finite".into()));
        }
        if !(self.extent_expansion.is_finite() && self.extent_expansion >= 1.0) {
            return Err(Error::InvalidConfig(
                "extent_expansion must be finite and >= 1".into(),
            ));
        }
        if self.rest_interval.is_zero() {
            return Err(Error::InvalidConfig("rest_interval must be > 0".into()));
        }

        Ok(())
    }
}
