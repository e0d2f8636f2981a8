use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use map_flow::prelude::*;
use map_flow_examples::{gyre_source, init_tracing, PngSink, RenderConfig};
use tracing::info;

const FRAME: Duration = Duration::from_millis(16);
const FRAMES_PER_STEP: usize = 30;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let (width, height) = (640u32, 480u32);

    let config = FlowConfig::new()
        .with_streamline_count(3000)
        .with_smoothing(2.0);
    let coordinator = Arc::new(OffloadCoordinator::with_worker(config.clone())?);
    let mut lifecycle = FlowLifecycle::new(config, gyre_source(400.0, 40.0), coordinator)?
        .with_dispatch(Dispatch::Background)
        .with_event_sink(FnSink::new(|event: FlowEvent| {
            info!("{:?} {:?} generation {}.", event.kind(), event.class(), event.id());
        }));
    let mut sink = PngSink::new(RenderConfig::new((width, height)));

    lifecycle.request_shared(FlowStyle::default().with_max_speed(800.0))?;

    // A pan to the east followed by a zoom in, one viewport change per step.
    let steps: Vec<Viewport> = (0..4)
        .map(|i| viewport(i as f64 * 60.0, 0.0, 1.0, width, height))
        .chain((1..4).map(|i| viewport(180.0, 0.0, 1.0 / (1.0 + i as f64 * 0.5), width, height)))
        .collect();

    let start = Instant::now();
    for (step, view) in steps.iter().enumerate() {
        lifecycle.on_viewport_change(*view)?;

        for frame in 0..FRAMES_PER_STEP {
            lifecycle.poll(&mut sink);
            sink.clear();
            let outcome = lifecycle.render(
                &mut sink,
                view,
                &FrameContext {
                    time: start.elapsed().as_secs_f32(),
                    opacity: 1.0,
                },
            );
            if frame == FRAMES_PER_STEP - 1 {
                info!(
                    "Step {}: drawn={}, redraw={}, live meshes={}.",
                    step,
                    outcome.drawn,
                    outcome.redraw,
                    sink.live_meshes()
                );
                sink.save(format!("lifecycle-pan-zoom-{step}.png"))?;
            }
            thread::sleep(FRAME);
        }
    }

    lifecycle.teardown(&mut sink);
    info!("Live meshes after teardown: {}.", sink.live_meshes());
    Ok(())
}

fn viewport(x: f64, y: f64, resolution: f64, width: u32, height: u32) -> Viewport {
    let half_w = width as f64 * resolution * 0.5;
    let half_h = height as f64 * resolution * 0.5;
    let (cx, cy) = (x + 320.0, y + 240.0);
    Viewport::new(
        Extent::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h),
        resolution,
    )
}
