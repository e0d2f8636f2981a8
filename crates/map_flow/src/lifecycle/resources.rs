//! Resource payloads and the rendering sink they are attached to.
//!
//! Two payload kinds exist: [`SharedResources`] (viewport independent, e.g. the color ramp)
//! and [`MeshResources`] (one ribbon mesh built for a viewport). Both implement [`Resources`],
//! which moves their buffers into a [`RenderSink`] on attach and releases them on detach.
use crate::error::{Error, Result};
use crate::lifecycle::viewport::{FieldAnchor, RenderParams};
use crate::mesh::RibbonMesh;

/// Number of entries in the speed color ramp.
pub const RAMP_SIZE: usize = 256;

/// Sink-side handle of an attached mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Sink-side handle of attached shared resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub u64);

/// The rendering collaborator (GPU upload and draw calls live behind this trait).
pub trait RenderSink {
    /// Upload viewport-independent resources.
    fn attach_shared(&mut self, shared: &SharedPayload) -> Result<SharedHandle>;

    /// Take ownership of a mesh's buffers.
    fn attach_mesh(&mut self, mesh: RibbonMesh) -> Result<MeshHandle>;

    fn render(&mut self, shared: SharedHandle, mesh: MeshHandle, params: &RenderParams);

    fn detach_mesh(&mut self, handle: MeshHandle);

    fn detach_shared(&mut self, handle: SharedHandle);
}

/// A payload that can be attached to and detached from a [`RenderSink`].
pub trait Resources {
    fn is_attached(&self) -> bool;

    /// Hand the payload to the sink. Attaching an attached payload is a no-op.
    fn attach(&mut self, sink: &mut dyn RenderSink) -> Result<()>;

    /// Release the payload from the sink. Detaching a detached payload is a no-op.
    fn detach(&mut self, sink: &mut dyn RenderSink);
}

/// A color ramp stop at a normalized speed position in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorStop {
    pub position: f32,
    pub color: [u8; 4],
}

impl ColorStop {
    pub fn new(position: f32, color: [u8; 4]) -> Self {
        Self { position, color }
    }
}

/// Visual style shared by all generations.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowStyle {
    /// Ramp stops ordered by position.
    pub color_stops: Vec<ColorStop>,
    /// Speed mapped to the end of the ramp.
    pub max_speed: f32,
    /// Ribbon width in CSS pixels.
    pub line_width: f32,
    /// Trail length in seconds.
    pub trail_duration: f32,
    pub opacity: f32,
}

impl Default for FlowStyle {
    fn default() -> Self {
        Self {
            color_stops: vec![
                ColorStop::new(0.0, [39, 110, 241, 255]),
                ColorStop::new(0.5, [80, 200, 220, 255]),
                ColorStop::new(1.0, [255, 255, 255, 255]),
            ],
            max_speed: 1000.0,
            line_width: 2.0,
            trail_duration: 1.0,
            opacity: 1.0,
        }
    }
}

impl FlowStyle {
    pub fn with_color_stops(mut self, color_stops: Vec<ColorStop>) -> Self {
        self.color_stops = color_stops;
        self
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn with_line_width(mut self, line_width: f32) -> Self {
        self.line_width = line_width;
        self
    }

    pub fn with_trail_duration(mut self, trail_duration: f32) -> Self {
        self.trail_duration = trail_duration;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Validates the style, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.color_stops.is_empty() {
            return Err(Error::InvalidConfig("color_stops must not be empty".into()));
        }
        let mut last = f32::NEG_INFINITY;
        for stop in &self.color_stops {
            if !(0.0..=1.0).contains(&stop.position) || stop.position < last {
                return Err(Error::InvalidConfig(
                    "color stop positions must be ascending within [0, 1]".into(),
                ));
            }
            last = stop.position;
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(Error::InvalidConfig("max_speed must be > 0".into()));
        }
        if !(self.line_width.is_finite() && self.line_width > 0.0) {
            return Err(Error::InvalidConfig("line_width must be > 0".into()));
        }
        if !(self.trail_duration.is_finite() && self.trail_duration > 0.0) {
            return Err(Error::InvalidConfig("trail_duration must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::InvalidConfig("opacity must be within [0, 1]".into()));
        }
        Ok(())
    }
}

/// CPU-side shared data: the style and its precomputed color ramp.
#[derive(Clone, Debug, PartialEq)]
pub struct SharedPayload {
    pub style: FlowStyle,
    /// [`RAMP_SIZE`] RGBA entries covering speeds `0..=max_speed`.
    pub ramp: Vec<[u8; 4]>,
}

impl SharedPayload {
    /// Validate `style` and bake its color ramp.
    pub fn build(style: FlowStyle) -> Result<Self> {
        style.validate()?;
        let stops = &style.color_stops;
        let ramp = (0..RAMP_SIZE)
            .map(|i| {
                let t = i as f32 / (RAMP_SIZE - 1) as f32;
                let upper = stops.iter().position(|s| s.position >= t);
                match upper {
                    None => stops[stops.len() - 1].color,
                    Some(0) => stops[0].color,
                    Some(j) => {
                        let (a, b) = (stops[j - 1], stops[j]);
                        let span = b.position - a.position;
                        let f = if span > 0.0 {
                            (t - a.position) / span
                        } else {
                            1.0
                        };
                        let mut c = [0u8; 4];
                        for k in 0..4 {
                            let v = a.color[k] as f32 + (b.color[k] as f32 - a.color[k] as f32) * f;
                            c[k] = v.round().clamp(0.0, 255.0) as u8;
                        }
                        c
                    }
                }
            })
            .collect();
        Ok(Self { style, ramp })
    }
}

/// Shared resources of one generation.
#[derive(Debug)]
pub struct SharedResources {
    payload: SharedPayload,
    handle: Option<SharedHandle>,
}

impl SharedResources {
    pub fn new(payload: SharedPayload) -> Self {
        Self {
            payload,
            handle: None,
        }
    }

    pub fn payload(&self) -> &SharedPayload {
        &self.payload
    }

    pub fn style(&self) -> &FlowStyle {
        &self.payload.style
    }

    pub fn handle(&self) -> Option<SharedHandle> {
        self.handle
    }
}

impl Resources for SharedResources {
    fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    fn attach(&mut self, sink: &mut dyn RenderSink) -> Result<()> {
        if self.handle.is_none() {
            self.handle = Some(sink.attach_shared(&self.payload)?);
        }
        Ok(())
    }

    fn detach(&mut self, sink: &mut dyn RenderSink) {
        if let Some(handle) = self.handle.take() {
            sink.detach_shared(handle);
        }
    }
}

/// One ribbon mesh and the anchor it was built for.
///
/// The CPU-side mesh is moved into the sink on attach; afterwards only the handle remains.
#[derive(Debug)]
pub struct MeshResources {
    mesh: Option<RibbonMesh>,
    handle: Option<MeshHandle>,
    anchor: FieldAnchor,
}

impl MeshResources {
    pub fn new(mesh: RibbonMesh, anchor: FieldAnchor) -> Self {
        Self {
            mesh: Some(mesh),
            handle: None,
            anchor,
        }
    }

    /// The CPU-side mesh, until it has been handed to the sink.
    pub fn mesh(&self) -> Option<&RibbonMesh> {
        self.mesh.as_ref()
    }

    pub fn anchor(&self) -> &FieldAnchor {
        &self.anchor
    }

    pub fn handle(&self) -> Option<MeshHandle> {
        self.handle
    }
}

impl Resources for MeshResources {
    fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    fn attach(&mut self, sink: &mut dyn RenderSink) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let mesh = self
            .mesh
            .take()
            .ok_or_else(|| Error::Sink("mesh buffers were already consumed".into()))?;
        self.handle = Some(sink.attach_mesh(mesh)?);
        Ok(())
    }

    fn detach(&mut self, sink: &mut dyn RenderSink) {
        if let Some(handle) = self.handle.take() {
            sink.detach_mesh(handle);
        }
    }
}

/// A call observed by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum SinkCall {
    AttachShared(SharedHandle),
    AttachMesh { handle: MeshHandle, indices: usize },
    Render {
        shared: SharedHandle,
        mesh: MeshHandle,
        params: RenderParams,
    },
    DetachMesh(MeshHandle),
    DetachShared(SharedHandle),
}

/// A sink that records calls and tracks live handles instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Vec<SinkCall>,
    live_meshes: Vec<MeshHandle>,
    live_shared: Vec<SharedHandle>,
    next_handle: u64,
    fail_attach: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent attach calls fail with [`Error::Sink`].
    pub fn set_fail_attach(&mut self, fail: bool) {
        self.fail_attach = fail;
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Meshes attached and not yet detached.
    pub fn live_meshes(&self) -> &[MeshHandle] {
        &self.live_meshes
    }

    /// Shared resources attached and not yet detached.
    pub fn live_shared(&self) -> &[SharedHandle] {
        &self.live_shared
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderSink for RecordingSink {
    fn attach_shared(&mut self, _shared: &SharedPayload) -> Result<SharedHandle> {
        if self.fail_attach {
            return Err(Error::Sink("attach refused".into()));
        }
        let handle = SharedHandle(self.next());
        self.live_shared.push(handle);
        self.calls.push(SinkCall::AttachShared(handle));
        Ok(handle)
    }

    fn attach_mesh(&mut self, mesh: RibbonMesh) -> Result<MeshHandle> {
        if self.fail_attach {
            return Err(Error::Sink("attach refused".into()));
        }
        let handle = MeshHandle(self.next());
        self.live_meshes.push(handle);
        self.calls.push(SinkCall::AttachMesh {
            handle,
            indices: mesh.indices.len(),
        });
        Ok(handle)
    }

    fn render(&mut self, shared: SharedHandle, mesh: MeshHandle, params: &RenderParams) {
        self.calls.push(SinkCall::Render {
            shared,
            mesh,
            params: *params,
        });
    }

    fn detach_mesh(&mut self, handle: MeshHandle) {
        self.live_meshes.retain(|h| *h != handle);
        self.calls.push(SinkCall::DetachMesh(handle));
    }

    fn detach_shared(&mut self, handle: SharedHandle) {
        self.live_shared.retain(|h| *h != handle);
        self.calls.push(SinkCall::DetachShared(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::viewport::{Extent, Viewport};

    fn anchor() -> FieldAnchor {
        Viewport::new(Extent::new(0.0, 0.0, 10.0, 10.0), 1.0).anchor(1.0)
    }

    #[test]
    fn ramp_interpolates_between_stops() {
        let style = FlowStyle::default().with_color_stops(vec![
            ColorStop::new(0.0, [0, 0, 0, 255]),
            ColorStop::new(1.0, [255, 255, 255, 255]),
        ]);
        let payload = SharedPayload::build(style).unwrap();
        assert_eq!(payload.ramp.len(), RAMP_SIZE);
        assert_eq!(payload.ramp[0], [0, 0, 0, 255]);
        assert_eq!(payload.ramp[RAMP_SIZE - 1], [255, 255, 255, 255]);
        assert_eq!(payload.ramp[128], [128, 128, 128, 255]);
    }

    #[test]
    fn ramp_clamps_outside_stop_range() {
        let style = FlowStyle::default().with_color_stops(vec![
            ColorStop::new(0.25, [10, 0, 0, 255]),
            ColorStop::new(0.75, [20, 0, 0, 255]),
        ]);
        let payload = SharedPayload::build(style).unwrap();
        assert_eq!(payload.ramp[0], [10, 0, 0, 255]);
        assert_eq!(payload.ramp[RAMP_SIZE - 1], [20, 0, 0, 255]);
    }

    #[test]
    fn invalid_style_is_rejected() {
        assert!(SharedPayload::build(FlowStyle::default().with_color_stops(Vec::new())).is_err());
        assert!(SharedPayload::build(FlowStyle::default().with_color_stops(vec![
            ColorStop::new(0.8, [0; 4]),
            ColorStop::new(0.2, [0; 4]),
        ]))
        .is_err());
        assert!(SharedPayload::build(FlowStyle::default().with_line_width(0.0)).is_err());
    }

    #[test]
    fn mesh_attach_moves_buffers_and_is_idempotent() {
        let mut sink = RecordingSink::new();
        let mesh = RibbonMesh {
            vertices: vec![0.0; 36],
            indices: vec![0, 1, 2, 1, 3, 2],
        };
        let mut resources = MeshResources::new(mesh, anchor());
        resources.attach(&mut sink).unwrap();
        assert!(resources.is_attached());
        assert!(resources.mesh().is_none());

        resources.attach(&mut sink).unwrap();
        assert_eq!(sink.calls().len(), 1);
        assert_eq!(sink.live_meshes().len(), 1);

        resources.detach(&mut sink);
        resources.detach(&mut sink);
        assert!(!resources.is_attached());
        assert!(sink.live_meshes().is_empty());
        assert_eq!(sink.calls().len(), 2);
    }

    #[test]
    fn failed_attach_reports_sink_error() {
        let mut sink = RecordingSink::new();
        sink.set_fail_attach(true);
        let mut shared = SharedResources::new(SharedPayload::build(FlowStyle::default()).unwrap());
        assert!(matches!(shared.attach(&mut sink), Err(Error::Sink(_))));
        assert!(!shared.is_attached());
    }
}
