//! Raster storage for two-channel (u, v) vector fields.
//!
//! Samples are stored row-major with the two channels interleaved, so cell `(x, y)` occupies
//! `samples[2 * (y * width + x)]` (u) and the following slot (v).
use glam::Vec2;

use crate::error::{Error, Result};

/// Nearest-cell lookup into a vector field.
pub trait FieldSample {
    /// Raster size as `(width, height)` in cells.
    fn size(&self) -> (usize, usize);

    /// Velocity at cell `(ix, iy)`. Callers guarantee the indices are in bounds.
    fn cell(&self, ix: usize, iy: usize) -> Vec2;

    /// Sample at a pixel position, rounding to the nearest cell with halves rounded up
    /// (`floor(x + 0.5)`), so `-0.5` maps to cell 0. Out of bounds yields `(0, 0)`.
    #[inline]
    fn sample(&self, x: f32, y: f32) -> Vec2 {
        let (w, h) = self.size();
        let fx = (x + 0.5).floor();
        let fy = (y + 0.5).floor();
        if !(fx >= 0.0 && fy >= 0.0 && fx < w as f32 && fy < h as f32) {
            return Vec2::ZERO;
        }
        self.cell(fx as usize, fy as usize)
    }
}

/// A raster grid of 2D velocity samples as delivered by a field source.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorField {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl VectorField {
    /// Create a field, validating that `samples.len() == 2 * width * height`.
    pub fn new(width: usize, height: usize, samples: Vec<f32>) -> Result<Self> {
        check_dimensions(width, height, samples.len())?;
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Create a field filled with a constant velocity.
    pub fn constant(width: usize, height: usize, velocity: Vec2) -> Self {
        let mut samples = Vec::with_capacity(2 * width * height);
        for _ in 0..width * height {
            samples.push(velocity.x);
            samples.push(velocity.y);
        }
        Self {
            width,
            height,
            samples,
        }
    }

    /// Create a field by evaluating `f(x, y)` at every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Vec2) -> Self {
        let mut samples = Vec::with_capacity(2 * width * height);
        for y in 0..height {
            for x in 0..width {
                let v = f(x, y);
                samples.push(v.x);
                samples.push(v.y);
            }
        }
        Self {
            width,
            height,
            samples,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Interleaved `(u, v)` samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Give up ownership of the sample buffer.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

impl FieldSample for VectorField {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    fn cell(&self, ix: usize, iy: usize) -> Vec2 {
        let i = 2 * (iy * self.width + ix);
        Vec2::new(self.samples[i], self.samples[i + 1])
    }
}

/// A vector field after Gaussian smoothing. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothedField {
    inner: VectorField,
}

impl SmoothedField {
    pub(crate) fn from_parts(width: usize, height: usize, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), 2 * width * height);
        Self {
            inner: VectorField {
                width,
                height,
                samples,
            },
        }
    }

    pub fn width(&self) -> usize {
        self.inner.width
    }

    pub fn height(&self) -> usize {
        self.inner.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }
}

impl FieldSample for SmoothedField {
    fn size(&self) -> (usize, usize) {
        self.inner.size()
    }

    #[inline]
    fn cell(&self, ix: usize, iy: usize) -> Vec2 {
        self.inner.cell(ix, iy)
    }
}

/// Fails with [`Error::InvalidInput`] unless `len == 2 * width * height`.
pub fn check_dimensions(width: usize, height: usize, len: usize) -> Result<()> {
    let expected = width
        .checked_mul(height)
        .and_then(|cells| cells.checked_mul(2))
        .ok_or_else(|| Error::InvalidInput(format!("field size {width}x{height} overflows")))?;
    if expected != len {
        return Err(Error::InvalidInput(format!(
            "field {width}x{height} needs {expected} samples, got {len}"
        )));
    }
    Ok(())
}
