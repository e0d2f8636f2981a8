//! Separable Gaussian smoothing of two-channel vector fields.
//!
//! The blur runs a horizontal pass followed by a vertical pass with weights
//! `exp(-d² / sigma²)` for offsets `d` in `[-round(3 sigma), round(3 sigma)]`. Taps that fall
//! outside the raster are left out of the weighted sum, so edge cells are renormalized over the
//! taps that exist rather than clamped or wrapped.
use crate::config::FlowConfig;
use crate::error::{Error, Result};
use crate::field::raster::{SmoothedField, VectorField};

/// Default floor for the accumulated kernel weight.
pub const DEFAULT_MIN_WEIGHT: f32 = 0.001;

/// Gaussian blur over a [`VectorField`].
#[derive(Clone, Debug)]
pub struct FieldSmoother {
    /// Kernel width parameter in cells.
    pub sigma: f32,
    /// Cells whose accumulated weight is below this value become `(0, 0)`.
    pub min_weight: f32,
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

impl FieldSmoother {
    /// Create a smoother with the given sigma and the default weight floor.
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            min_weight: DEFAULT_MIN_WEIGHT,
        }
    }

    /// Create a smoother from the configured sigma and weight floor.
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            sigma: config.smoothing,
            min_weight: config.min_weight,
        }
    }

    /// Sets the weight floor.
    pub fn with_min_weight(mut self, min_weight: f32) -> Self {
        self.min_weight = min_weight;
        self
    }

    /// Kernel radius in cells, `round(3 sigma)`.
    pub fn radius(&self) -> usize {
        (3.0 * self.sigma).round().max(0.0) as usize
    }

    /// Kernel weights for offsets `-r..=r`, where `r` is [`radius`](Self::radius) capped at
    /// `max_radius`.
    ///
    /// Weights are evaluated in `f64` so that `sigma²` stays nonzero for every positive `f32`
    /// sigma; the centre weight is always `1.0`.
    pub fn kernel(&self, max_radius: usize) -> Vec<f32> {
        let r = self.radius().min(max_radius) as isize;
        let s2 = f64::from(self.sigma) * f64::from(self.sigma);
        (-r..=r)
            .map(|d| {
                let d = d as f64;
                (-(d * d) / s2).exp() as f32
            })
            .collect()
    }

    /// Smooth `field`, producing a field of the same dimensions.
    pub fn smooth(&self, field: &VectorField) -> Result<SmoothedField> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(Error::InvalidInput(format!(
                "smoothing sigma must be finite and > 0, got {}",
                self.sigma
            )));
        }

        let (w, h) = (field.width(), field.height());
        // Offsets of at least max(w, h) never land inside the raster.
        let kernel = self.kernel(w.max(h).saturating_sub(1));
        let horizontal = self.pass(field.samples(), w, h, &kernel, Axis::Horizontal);
        let vertical = self.pass(&horizontal, w, h, &kernel, Axis::Vertical);
        Ok(SmoothedField::from_parts(w, h, vertical))
    }

    fn pass(&self, src: &[f32], w: usize, h: usize, kernel: &[f32], axis: Axis) -> Vec<f32> {
        let r = (kernel.len() / 2) as isize;
        let mut out = vec![0.0; src.len()];

        for y in 0..h {
            for x in 0..w {
                let (mut su, mut sv, mut sw) = (0.0f32, 0.0f32, 0.0f32);
                for d in -r..=r {
                    let (sx, sy) = match axis {
                        Axis::Horizontal => (x as isize + d, y as isize),
                        Axis::Vertical => (x as isize, y as isize + d),
                    };
                    if sx < 0 || sy < 0 || sx >= w as isize || sy >= h as isize {
                        continue;
                    }
                    let weight = kernel[(d + r) as usize];
                    let i = 2 * (sy as usize * w + sx as usize);
                    su += weight * src[i];
                    sv += weight * src[i + 1];
                    sw += weight;
                }

                let o = 2 * (y * w + x);
                if sw >= self.min_weight {
                    out[o] = su / sw;
                    out[o + 1] = sv / sw;
                }
            }
        }

        out
    }
}
