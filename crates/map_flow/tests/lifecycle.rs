use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use glam::Vec2;
use map_flow::offload::worker::WorkerRequest;
use map_flow::prelude::*;

const TIMEOUT: Duration = Duration::from_secs(20);

fn config() -> FlowConfig {
    FlowConfig::new()
        .with_streamline_count(150)
        .with_max_steps(25)
        .with_smoothing(1.0)
}

fn counting_source(fetches: Arc<AtomicUsize>) -> Arc<dyn FieldSource> {
    Arc::new(FnSource::new(move |request: &FieldRequest| {
        fetches.fetch_add(1, Ordering::SeqCst);
        let cx = request.width as f32 * 0.5;
        let cy = request.height as f32 * 0.5;
        Ok(VectorField::from_fn(request.width, request.height, |x, y| {
            Vec2::new(cy - y as f32, x as f32 - cx) * 0.05
        }))
    }))
}

fn viewport(x: f64, resolution: f64) -> Viewport {
    Viewport::new(Extent::new(x, 0.0, x + 64.0 * resolution, 48.0 * resolution), resolution)
}

fn poll_until(
    lifecycle: &mut FlowLifecycle,
    sink: &mut RecordingSink,
    mut done: impl FnMut(&FlowLifecycle) -> bool,
) {
    let deadline = Instant::now() + TIMEOUT;
    while !done(lifecycle) {
        assert!(Instant::now() < deadline, "lifecycle did not settle in time");
        lifecycle.poll(sink);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn pan_zoom_session_never_drops_to_zero_attached() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let coordinator = Arc::new(OffloadCoordinator::with_worker(config()).unwrap());
    let (tx, rx) = unbounded();
    let mut lifecycle = FlowLifecycle::new(config(), counting_source(fetches), coordinator)
        .unwrap()
        .with_event_sink(ChannelSink::new(tx));
    let mut sink = RecordingSink::new();

    lifecycle.request_shared(FlowStyle::default()).unwrap();
    let first = lifecycle.on_viewport_change(viewport(0.0, 1.0)).unwrap().unwrap();
    poll_until(&mut lifecycle, &mut sink, |l| {
        l.attached_local() == Some(first) && l.attached_shared().is_some()
    });

    let mut last = first;
    for step in 1..6 {
        let v = viewport(step as f64 * 7.0, 1.0 + step as f64 * 0.25);
        last = lifecycle.on_viewport_change(v).unwrap().unwrap();
        for _ in 0..3 {
            lifecycle.poll(&mut sink);
            assert_eq!(sink.live_meshes().len(), 1);
            let outcome = lifecycle.render(&mut sink, &v, &FrameContext::default());
            assert!(outcome.drawn);
        }
    }
    poll_until(&mut lifecycle, &mut sink, |l| l.attached_local() == Some(last));
    assert_eq!(sink.live_meshes().len(), 1);
    assert_eq!(lifecycle.local_generations().len(), 1);

    lifecycle.teardown(&mut sink);
    assert!(sink.live_meshes().is_empty());
    assert!(sink.live_shared().is_empty());

    let events: Vec<FlowEvent> = rx.try_iter().collect();
    let attached = events
        .iter()
        .filter(|e| e.kind() == FlowEventKind::Attached && e.class() == ResourceClass::Local)
        .count();
    let detached = events
        .iter()
        .filter(|e| e.kind() == FlowEventKind::Detached && e.class() == ResourceClass::Local)
        .count();
    assert!(attached >= 2);
    assert!(detached >= attached);
}

#[test]
fn crashed_worker_falls_back_to_refetch_and_inline() {
    let (tx, rx) = unbounded::<WorkerRequest>();
    let crashing = thread::spawn(move || {
        // Accept one request and drop it without replying.
        let _ = rx.recv();
    });
    let coordinator = Arc::new(OffloadCoordinator::with_mesh_worker(
        config(),
        MeshWorker::with_sender(tx),
    ));
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut lifecycle =
        FlowLifecycle::new(config(), counting_source(Arc::clone(&fetches)), coordinator)
            .unwrap()
            .with_dispatch(Dispatch::Inline);
    let mut sink = RecordingSink::new();

    let id = lifecycle.request_local(viewport(0.0, 1.0)).unwrap();
    lifecycle.poll(&mut sink);
    crashing.join().unwrap();

    assert_eq!(lifecycle.attached_local(), Some(id));
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[test]
fn unavailable_worker_runs_inline_without_refetch() {
    let (tx, rx) = unbounded::<WorkerRequest>();
    drop(rx);
    let coordinator = Arc::new(OffloadCoordinator::with_mesh_worker(
        config(),
        MeshWorker::with_sender(tx),
    ));
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut lifecycle =
        FlowLifecycle::new(config(), counting_source(Arc::clone(&fetches)), coordinator)
            .unwrap()
            .with_dispatch(Dispatch::Inline);
    let mut sink = RecordingSink::new();

    let id = lifecycle.request_local(viewport(0.0, 1.0)).unwrap();
    lifecycle.poll(&mut sink);
    assert_eq!(lifecycle.attached_local(), Some(id));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn render_params_follow_the_viewport_after_attach() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let coordinator = Arc::new(OffloadCoordinator::inline(config()));
    let mut lifecycle = FlowLifecycle::new(
        config().with_extent_expansion(1.0),
        counting_source(fetches),
        coordinator,
    )
    .unwrap()
    .with_dispatch(Dispatch::Inline);
    let mut sink = RecordingSink::new();

    lifecycle.request_shared(FlowStyle::default().with_opacity(0.5)).unwrap();
    lifecycle.request_local(viewport(0.0, 1.0)).unwrap();
    lifecycle.poll(&mut sink);

    let panned = viewport(16.0, 1.0);
    let frame = FrameContext {
        time: 2.5,
        opacity: 0.8,
    };
    assert!(lifecycle.render(&mut sink, &panned, &frame).drawn);
    match sink.calls().last() {
        Some(SinkCall::Render { params, .. }) => {
            assert_eq!(params.translation, [-16.0, 0.0]);
            assert_eq!(params.scale, 1.0);
            assert_eq!(params.time, 2.5);
            assert!((params.opacity - 0.4).abs() < 1e-6);
        }
        other => panic!("expected a render call, got {other:?}"),
    }
}
