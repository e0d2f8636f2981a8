use std::time::Duration;

use map_flow::offload::rest::RestPoint;
use map_flow::prelude::*;
use map_flow_examples::{
    init_tracing, render_mesh_to_png, render_streamlines_to_png, vortex_field, RenderConfig,
};
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let (width, height) = (320, 240);

    let config = FlowConfig::new()
        .with_streamline_count(1500)
        .with_smoothing(2.0)
        .with_max_steps(120);
    config.validate()?;

    let field = vortex_field(width, height, 0.02);
    let smoothed = FieldSmoother::from_config(&config).smooth(&field)?;

    let token = CancellationToken::new();
    let mut rest = RestPoint::new(&token, Duration::from_millis(100));
    let mut rng = DeterministicRandom::new(config.seed);
    let lines = StreamlineTracer::from_config(&config).trace_batch(
        &smoothed,
        config.streamline_count,
        &mut rng,
        &mut rest,
    )?;
    let (mesh, stats) = RibbonMeshBuilder::from_config(&config).build_with_stats(&lines, &mut rng);
    tracing::info!(
        "Traced {} streamlines into {} segments ({} skipped).",
        stats.streamlines,
        stats.segments,
        stats.skipped_segments
    );

    let style = FlowStyle::default().with_max_speed(400.0);
    let cfg = RenderConfig::new((960, 720)).with_scale(3.0);
    render_streamlines_to_png(&lines, &style, &cfg, "streamlines-vortex-lines.png")?;
    render_mesh_to_png(&mesh, &style, 0.35, &cfg, "streamlines-vortex-mesh.png")?;
    Ok(())
}
