use map_flow::prelude::*;
use map_flow_examples::{init_tracing, noise_field, render_mesh_to_png, RenderConfig};
use tokio_util::sync::CancellationToken;

const SIGMAS: [f32; 3] = [0.5, 2.0, 6.0];

fn main() -> anyhow::Result<()> {
    init_tracing();
    let field = noise_field(256, 192, 4.0, 7);
    let style = FlowStyle::default().with_max_speed(300.0);
    let cfg = RenderConfig::new((768, 576)).with_scale(3.0);
    let token = CancellationToken::new();

    for sigma in SIGMAS {
        let config = FlowConfig::new()
            .with_streamline_count(2000)
            .with_smoothing(sigma);
        config.validate()?;

        let mesh = build_mesh(&field, sigma, &config, &token)?;
        tracing::info!("sigma {sigma}: {} segments.", mesh.segment_count());
        render_mesh_to_png(
            &mesh,
            &style,
            0.5,
            &cfg,
            format!("smoothing-sigma-{sigma}.png"),
        )?;
    }
    Ok(())
}
