//! Viewport geometry supplied by the host and the per-frame transform derived from it.
use crate::error::{Error, Result};
use crate::field::FieldRequest;
use crate::lifecycle::resources::FlowStyle;

/// Axis-aligned map extent in map units (y grows upwards).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) * 0.5,
            (self.ymin + self.ymax) * 0.5,
        )
    }

    /// Grow the extent about its center by `factor` in both directions.
    pub fn expand(&self, factor: f64) -> Self {
        let (cx, cy) = self.center();
        let hw = self.width() * factor * 0.5;
        let hh = self.height() * factor * 0.5;
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    fn is_valid(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }
}

/// The host's view state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Visible map extent.
    pub extent: Extent,
    /// Map units per CSS pixel.
    pub resolution: f64,
    /// Device pixels per CSS pixel.
    pub pixel_ratio: f32,
    /// View rotation in radians.
    pub rotation: f32,
}

impl Viewport {
    pub fn new(extent: Extent, resolution: f64) -> Self {
        Self {
            extent,
            resolution,
            pixel_ratio: 1.0,
            rotation: 0.0,
        }
    }

    /// Sets the pixel ratio.
    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    /// Sets the rotation in radians.
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Fails with [`Error::InvalidInput`] for empty extents or non-finite parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.extent.is_valid() {
            return Err(Error::InvalidInput(format!(
                "viewport extent must be finite and non-empty: {:?}",
                self.extent
            )));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(Error::InvalidInput(format!(
                "viewport resolution must be finite and > 0, got {}",
                self.resolution
            )));
        }
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) || !self.rotation.is_finite()
        {
            return Err(Error::InvalidInput(
                "viewport pixel ratio and rotation must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Anchor for a field covering this viewport grown by `expansion`.
    pub fn anchor(&self, expansion: f64) -> FieldAnchor {
        FieldAnchor {
            extent: self.extent.expand(expansion),
            resolution: self.resolution,
        }
    }
}

/// The map extent and resolution a mesh was built for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldAnchor {
    /// Expanded extent covered by the field raster.
    pub extent: Extent,
    /// Map units per field pixel.
    pub resolution: f64,
}

impl FieldAnchor {
    /// Raster request covering the anchor at one cell per pixel.
    pub fn field_request(&self) -> FieldRequest {
        FieldRequest {
            extent: self.extent,
            width: (self.extent.width() / self.resolution).round().max(1.0) as usize,
            height: (self.extent.height() / self.resolution).round().max(1.0) as usize,
        }
    }
}

/// Per-frame animation inputs from the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    /// Animation clock in seconds.
    pub time: f32,
    /// Layer opacity in `[0, 1]`.
    pub opacity: f32,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            time: 0.0,
            opacity: 1.0,
        }
    }
}

/// Transform and animation parameters handed to the render sink each frame.
///
/// Mesh positions are field pixels of the anchor. A renderer maps them to screen pixels as
/// `translation + position * scale`, then rotates by `rotation` about the viewport center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// Screen-space offset of the anchor's top-left corner, in CSS pixels.
    pub translation: [f32; 2],
    /// View rotation in radians.
    pub rotation: f32,
    /// Anchor resolution relative to the current resolution.
    pub scale: f32,
    pub opacity: f32,
    pub pixel_ratio: f32,
    /// Animation clock in seconds.
    pub time: f32,
    /// Ribbon width in CSS pixels.
    pub line_width: f32,
    /// Length of a fading trail in seconds.
    pub trail_duration: f32,
}

impl RenderParams {
    pub fn new(
        anchor: &FieldAnchor,
        viewport: &Viewport,
        frame: &FrameContext,
        style: &FlowStyle,
    ) -> Self {
        let res = viewport.resolution;
        Self {
            translation: [
                ((anchor.extent.xmin - viewport.extent.xmin) / res) as f32,
                ((viewport.extent.ymax - anchor.extent.ymax) / res) as f32,
            ],
            rotation: viewport.rotation,
            scale: (anchor.resolution / res) as f32,
            opacity: frame.opacity.clamp(0.0, 1.0) * style.opacity,
            pixel_ratio: viewport.pixel_ratio,
            time: frame.time,
            line_width: style.line_width,
            trail_duration: style.trail_duration,
        }
    }
}
