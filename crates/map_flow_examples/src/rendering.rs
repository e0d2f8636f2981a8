use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use image::{Rgb, RgbImage};
use map_flow::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initializes a `tracing-subscriber` fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}

/// Output image settings.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub image_size: (u32, u32),
    pub background: [u8; 3],
    /// Image pixels per field pixel.
    pub scale: f32,
}

impl RenderConfig {
    pub fn new(image_size: (u32, u32)) -> Self {
        Self {
            image_size,
            background: [12, 16, 28],
            scale: 1.0,
        }
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    fn canvas(&self) -> RgbImage {
        RgbImage::from_pixel(self.image_size.0, self.image_size.1, Rgb(self.background))
    }
}

/// Draw streamlines as polylines, colored from slow (start of ramp) to fast (end of ramp).
pub fn render_streamlines_to_png(
    lines: &[Streamline],
    style: &FlowStyle,
    cfg: &RenderConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let payload = SharedPayload::build(style.clone())?;
    let mut img = cfg.canvas();
    for line in lines {
        for pair in line.vertices().windows(2) {
            let dt = pair[1].time - pair[0].time;
            let speed = if dt > 0.0 { 1.0 / dt } else { 0.0 };
            let color = ramp_color(&payload, speed * 100.0);
            draw_line(
                &mut img,
                pair[0].position.to_array().map(|c| c * cfg.scale),
                pair[1].position.to_array().map(|c| c * cfg.scale),
                color,
                0.9,
            );
        }
    }
    save(&img, path)
}

/// Draw a ribbon mesh frozen at animation time `time`.
pub fn render_mesh_to_png(
    mesh: &RibbonMesh,
    style: &FlowStyle,
    time: f32,
    cfg: &RenderConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let payload = SharedPayload::build(style.clone())?;
    let mut img = cfg.canvas();
    let transform = Transform {
        translation: [0.0, 0.0],
        scale: cfg.scale,
        rotation: 0.0,
        pivot: [0.0, 0.0],
    };
    draw_mesh(&mut img, mesh, &payload, &transform, time, style.opacity);
    save(&img, path)
}

/// A [`RenderSink`] that keeps attached buffers in memory and draws frames into a PNG canvas.
pub struct PngSink {
    cfg: RenderConfig,
    image: RgbImage,
    meshes: HashMap<MeshHandle, RibbonMesh>,
    shared: HashMap<SharedHandle, SharedPayload>,
    next_handle: u64,
}

impl PngSink {
    pub fn new(cfg: RenderConfig) -> Self {
        Self {
            image: cfg.canvas(),
            cfg,
            meshes: HashMap::new(),
            shared: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Number of meshes currently attached.
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Clear the canvas to the background color.
    pub fn clear(&mut self) {
        self.image = self.cfg.canvas();
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        save(&self.image, path)
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderSink for PngSink {
    fn attach_shared(&mut self, shared: &SharedPayload) -> Result<SharedHandle> {
        let handle = SharedHandle(self.next());
        self.shared.insert(handle, shared.clone());
        Ok(handle)
    }

    fn attach_mesh(&mut self, mesh: RibbonMesh) -> Result<MeshHandle> {
        let handle = MeshHandle(self.next());
        info!(
            "Uploaded mesh {} | {} segments.",
            handle.0,
            mesh.segment_count()
        );
        self.meshes.insert(handle, mesh);
        Ok(handle)
    }

    fn render(&mut self, shared: SharedHandle, mesh: MeshHandle, params: &RenderParams) {
        let (Some(payload), Some(mesh)) = (self.shared.get(&shared), self.meshes.get(&mesh)) else {
            return;
        };
        let (w, h) = self.cfg.image_size;
        let transform = Transform {
            translation: params.translation,
            scale: params.scale * params.pixel_ratio,
            rotation: params.rotation,
            pivot: [w as f32 * 0.5, h as f32 * 0.5],
        };
        let time = params.time / params.trail_duration;
        draw_mesh(
            &mut self.image,
            mesh,
            payload,
            &transform,
            time,
            params.opacity,
        );
    }

    fn detach_mesh(&mut self, handle: MeshHandle) {
        self.meshes.remove(&handle);
    }

    fn detach_shared(&mut self, handle: SharedHandle) {
        self.shared.remove(&handle);
    }
}

struct Transform {
    translation: [f32; 2],
    scale: f32,
    rotation: f32,
    pivot: [f32; 2],
}

impl Transform {
    fn apply(&self, p: [f32; 2]) -> [f32; 2] {
        let x = self.translation[0] + p[0] * self.scale - self.pivot[0];
        let y = self.translation[1] + p[1] * self.scale - self.pivot[1];
        let (s, c) = self.rotation.sin_cos();
        [
            x * c - y * s + self.pivot[0],
            x * s + y * c + self.pivot[1],
        ]
    }
}

fn draw_mesh(
    img: &mut RgbImage,
    mesh: &RibbonMesh,
    payload: &SharedPayload,
    transform: &Transform,
    time: f32,
    opacity: f32,
) {
    for segment in 0..mesh.segment_count() {
        // Vertices 0 and 2 of each quad sit on the same side of the segment start and end.
        let (Some(a), Some(b)) = (mesh.vertex(segment * 4), mesh.vertex(segment * 4 + 2)) else {
            continue;
        };
        let total = a.total_time.max(f32::EPSILON);
        let head = (time + a.random_phase).fract() * total;
        let age = (head - b.time).rem_euclid(total) / total;
        let alpha = (1.0 - age).powi(2) * opacity;
        if alpha <= 0.01 {
            continue;
        }
        draw_line(
            img,
            transform.apply(a.position),
            transform.apply(b.position),
            ramp_color(payload, a.speed),
            alpha,
        );
    }
}

fn ramp_color(payload: &SharedPayload, speed: f32) -> [u8; 3] {
    let t = (speed / payload.style.max_speed).clamp(0.0, 1.0);
    let index = (t * (payload.ramp.len() - 1) as f32).round() as usize;
    let [r, g, b, _] = payload.ramp[index.min(payload.ramp.len() - 1)];
    [r, g, b]
}

fn draw_line(img: &mut RgbImage, from: [f32; 2], to: [f32; 2], color: [u8; 3], alpha: f32) {
    const LIMIT: f32 = 1.0e5;
    if from.iter().chain(&to).any(|c| !(c.abs() < LIMIT)) {
        return;
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (mut x0, mut y0) = (from[0].round() as i64, from[1].round() as i64);
    let (x1, y1) = (to[0].round() as i64, to[1].round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if (0..w).contains(&x0) && (0..h).contains(&y0) {
            let pixel = img.get_pixel_mut(x0 as u32, y0 as u32);
            for (dst, src) in pixel.0.iter_mut().zip(color) {
                *dst = (*dst as f32 * (1.0 - alpha) + src as f32 * alpha).round() as u8;
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn save(img: &RgbImage, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    img.save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote {}.", path.display());
    Ok(())
}
