#![forbid(unsafe_code)]

mod fields;
mod rendering;

pub use fields::{gyre_source, noise_field, vortex_field};
pub use rendering::{
    init_tracing, render_mesh_to_png, render_streamlines_to_png, PngSink, RenderConfig,
};
