//! The generation lifecycle: request, cancel, complete, attach and supersede.
//!
//! [`FlowLifecycle`] keeps two resource classes. The shared class holds the
//! viewport-independent style payload and the local class holds one ribbon mesh per viewport
//! state. Each class is an ordered list of [`Generation`]s, oldest first.
//!
//! The host drives the lifecycle from a single context:
//!
//! 1. [`FlowLifecycle::on_viewport_change`] (or [`FlowLifecycle::request_local`]) once the view
//!    settles. Any pending local generation is cancelled and a new job is dispatched.
//! 2. [`FlowLifecycle::poll`] every frame. Finished jobs are applied and the newest ready
//!    generation is attached; older ones are detached in the same call, so some generation is
//!    renderable at every frame boundary.
//! 3. [`FlowLifecycle::render`] to draw, and [`FlowLifecycle::teardown`] when the layer goes
//!    away.
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FlowConfig;
use crate::error::{Error, Result};
use crate::field::{FieldRequest, FieldSource, VectorField};
use crate::lifecycle::events::{EventSink, FlowEvent, FlowEventKind, ResourceClass};
use crate::lifecycle::generation::{Generation, GenerationId};
use crate::lifecycle::resources::{
    FlowStyle, MeshResources, RenderSink, Resources, SharedPayload, SharedResources,
};
use crate::lifecycle::viewport::{FieldAnchor, FrameContext, RenderParams, Viewport};
use crate::offload::OffloadCoordinator;

/// Where generation jobs run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dispatch {
    /// Run the job during the request; its completion is applied on the next poll.
    Inline,
    /// Run each job on its own background thread.
    #[default]
    Background,
}

/// Result of a finished generation job.
#[derive(Debug)]
pub enum Completion {
    Shared {
        id: GenerationId,
        result: Result<SharedResources>,
    },
    Local {
        id: GenerationId,
        result: Result<MeshResources>,
    },
}

impl Completion {
    fn failed(class: ResourceClass, id: GenerationId, error: Error) -> Self {
        match class {
            ResourceClass::Shared => Completion::Shared {
                id,
                result: Err(error),
            },
            ResourceClass::Local => Completion::Local {
                id,
                result: Err(error),
            },
        }
    }

    pub fn id(&self) -> GenerationId {
        match self {
            Completion::Shared { id, .. } | Completion::Local { id, .. } => *id,
        }
    }

    pub fn class(&self) -> ResourceClass {
        match self {
            Completion::Shared { .. } => ResourceClass::Shared,
            Completion::Local { .. } => ResourceClass::Local,
        }
    }
}

/// What a call to [`FlowLifecycle::render`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    /// A mesh was drawn.
    pub drawn: bool,
    /// The host should schedule another frame.
    pub redraw: bool,
}

/// Coordinates generations of shared and local resources.
pub struct FlowLifecycle {
    config: FlowConfig,
    source: Arc<dyn FieldSource>,
    coordinator: Arc<OffloadCoordinator>,
    dispatch: Dispatch,
    events: Box<dyn EventSink + Send>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    next_id: GenerationId,
    shared: Vec<Generation<SharedResources>>,
    local: Vec<Generation<MeshResources>>,
    /// The last local request, cleared when that generation fails so the view can be retried.
    last_request: Option<(Viewport, GenerationId)>,
}

impl FlowLifecycle {
    pub fn new(
        config: FlowConfig,
        source: Arc<dyn FieldSource>,
        coordinator: Arc<OffloadCoordinator>,
    ) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = unbounded();
        Ok(Self {
            config,
            source,
            coordinator,
            dispatch: Dispatch::default(),
            events: Box::new(()),
            tx,
            rx,
            next_id: 1,
            shared: Vec::new(),
            local: Vec::new(),
            last_request: None,
        })
    }

    /// Sets where jobs run.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Sets the sink receiving [`FlowEvent`]s.
    pub fn with_event_sink(mut self, events: impl EventSink + Send + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Shared generations, oldest first.
    pub fn shared_generations(&self) -> &[Generation<SharedResources>] {
        &self.shared
    }

    /// Local generations, oldest first.
    pub fn local_generations(&self) -> &[Generation<MeshResources>] {
        &self.local
    }

    /// Id of the attached local generation.
    pub fn attached_local(&self) -> Option<GenerationId> {
        self.local.iter().find(|g| g.is_attached()).map(|g| g.id())
    }

    /// Id of the attached shared generation.
    pub fn attached_shared(&self) -> Option<GenerationId> {
        self.shared.iter().find(|g| g.is_attached()).map(|g| g.id())
    }

    /// Whether a job is running or a result waits to be attached.
    pub fn is_transitioning(&self) -> bool {
        self.local.iter().any(|g| g.is_pending() || g.is_ready())
            || self.shared.iter().any(|g| g.is_pending() || g.is_ready())
    }

    /// Request a local generation for `viewport` unless it equals the last requested one.
    ///
    /// A viewport whose generation failed is requested again.
    pub fn on_viewport_change(&mut self, viewport: Viewport) -> Result<Option<GenerationId>> {
        if self.last_request.map(|(last, _)| last) == Some(viewport) {
            return Ok(None);
        }
        self.request_local(viewport).map(Some)
    }

    /// Cancel any pending local generation and start building a mesh for `viewport`.
    pub fn request_local(&mut self, viewport: Viewport) -> Result<GenerationId> {
        viewport.validate()?;

        let (id, token) = self.begin(ResourceClass::Local);
        self.last_request = Some((viewport, id));
        let anchor = viewport.anchor(self.config.extent_expansion);
        let source = Arc::clone(&self.source);
        let coordinator = Arc::clone(&self.coordinator);
        let smoothing = self.config.smoothing;
        let request = anchor.field_request();
        info!(
            "Requested local generation {} | {}x{} field.",
            id, request.width, request.height,
        );

        self.dispatch_job(ResourceClass::Local, id, move || Completion::Local {
            id,
            result: build_local(source.as_ref(), &coordinator, anchor, smoothing, &token),
        });
        Ok(id)
    }

    /// Cancel any pending shared generation and start building the payload for `style`.
    pub fn request_shared(&mut self, style: FlowStyle) -> Result<GenerationId> {
        style.validate()?;

        let (id, token) = self.begin(ResourceClass::Shared);
        info!("Requested shared generation {}.", id);

        self.dispatch_job(ResourceClass::Shared, id, move || Completion::Shared {
            id,
            result: if token.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                SharedPayload::build(style).map(SharedResources::new)
            },
        });
        Ok(id)
    }

    /// Apply a finished job. Returns `true` if a generation became ready.
    pub fn on_complete(&mut self, completion: Completion) -> bool {
        match completion {
            Completion::Shared { id, result } => apply_completion(
                &mut self.shared,
                ResourceClass::Shared,
                id,
                result,
                self.events.as_mut(),
            ),
            Completion::Local { id, result } => {
                if result.is_err() && self.last_request.map(|(_, last)| last) == Some(id) {
                    self.last_request = None;
                }
                apply_completion(
                    &mut self.local,
                    ResourceClass::Local,
                    id,
                    result,
                    self.events.as_mut(),
                )
            }
        }
    }

    /// Attach the newest ready generation of each class and detach everything it supersedes.
    /// Returns `true` if anything was attached or detached.
    pub fn attach(&mut self, sink: &mut dyn RenderSink) -> bool {
        let shared = promote(
            &mut self.shared,
            ResourceClass::Shared,
            sink,
            self.events.as_mut(),
        );
        let local = promote(
            &mut self.local,
            ResourceClass::Local,
            sink,
            self.events.as_mut(),
        );
        shared || local
    }

    /// Apply all finished jobs, then attach. Returns `true` if the attached set changed.
    pub fn poll(&mut self, sink: &mut dyn RenderSink) -> bool {
        let completions: Vec<Completion> = self.rx.try_iter().collect();
        for completion in completions {
            self.on_complete(completion);
        }
        self.attach(sink)
    }

    /// Draw the attached mesh with the attached shared resources.
    pub fn render(
        &self,
        sink: &mut dyn RenderSink,
        viewport: &Viewport,
        frame: &FrameContext,
    ) -> RenderOutcome {
        let shared = self.shared.iter().rev().find_map(|g| g.attached());
        let local = self.local.iter().rev().find_map(|g| g.attached());

        let drawn = match (shared, local) {
            (Some(shared), Some(local)) => match (shared.handle(), local.handle()) {
                (Some(shared_handle), Some(mesh_handle)) => {
                    let params =
                        RenderParams::new(local.anchor(), viewport, frame, shared.style());
                    sink.render(shared_handle, mesh_handle, &params);
                    true
                }
                _ => false,
            },
            _ => false,
        };

        RenderOutcome {
            drawn,
            redraw: drawn || self.is_transitioning(),
        }
    }

    /// Cancel every pending job and detach everything attached.
    pub fn teardown(&mut self, sink: &mut dyn RenderSink) {
        let events: &mut dyn EventSink = self.events.as_mut();
        release_all(&mut self.shared, ResourceClass::Shared, sink, events);
        release_all(&mut self.local, ResourceClass::Local, sink, events);
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            debug!("Dropped {} queued completions on teardown.", dropped);
        }
        self.last_request = None;
        info!("Flow lifecycle torn down.");
    }

    fn begin(&mut self, class: ResourceClass) -> (GenerationId, CancellationToken) {
        let id = self.next_id;
        self.next_id += 1;

        let events: &mut dyn EventSink = self.events.as_mut();
        match class {
            ResourceClass::Shared => {
                abort_pending(&mut self.shared, class, events);
                let (generation, token) = Generation::pending(id);
                self.shared.push(generation);
                emit(events, FlowEventKind::Requested, || FlowEvent::Requested {
                    class,
                    id,
                });
                (id, token)
            }
            ResourceClass::Local => {
                abort_pending(&mut self.local, class, events);
                let (generation, token) = Generation::pending(id);
                self.local.push(generation);
                emit(events, FlowEventKind::Requested, || FlowEvent::Requested {
                    class,
                    id,
                });
                (id, token)
            }
        }
    }

    fn dispatch_job<F>(&self, class: ResourceClass, id: GenerationId, job: F)
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        match self.dispatch {
            Dispatch::Inline => {
                let _ = self.tx.send(job());
            }
            Dispatch::Background => {
                let tx = self.tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("map_flow-generation-{id}"))
                    .spawn(move || {
                        let _ = tx.send(job());
                    });
                if let Err(e) = spawned {
                    warn!("Failed to spawn job for generation {}: {}.", id, e);
                    let _ = self.tx.send(Completion::failed(
                        class,
                        id,
                        Error::Failed(format!("failed to spawn job: {e}")),
                    ));
                }
            }
        }
    }
}

impl Drop for FlowLifecycle {
    fn drop(&mut self) {
        for generation in self.shared.iter_mut() {
            generation.abort();
        }
        for generation in self.local.iter_mut() {
            generation.abort();
        }
    }
}

fn emit(events: &mut dyn EventSink, kind: FlowEventKind, event: impl FnOnce() -> FlowEvent) {
    if events.wants(kind) {
        events.send(event());
    }
}

fn build_local(
    source: &dyn FieldSource,
    coordinator: &OffloadCoordinator,
    anchor: FieldAnchor,
    smoothing: f32,
    token: &CancellationToken,
) -> Result<MeshResources> {
    let request = anchor.field_request();
    let field = fetch(source, &request, token)?;
    let mesh = match coordinator.run(field, smoothing, token) {
        Err(Error::OffloadChannelFailed(reason)) => {
            warn!("Offload failed ({}); refetching and running inline.", reason);
            let field = fetch(source, &request, token)?;
            coordinator.run_inline(field, smoothing, token)?
        }
        other => other?,
    };
    Ok(MeshResources::new(mesh, anchor))
}

fn fetch(
    source: &dyn FieldSource,
    request: &FieldRequest,
    token: &CancellationToken,
) -> Result<VectorField> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let field = source.fetch(request, token).map_err(|e| match e {
        Error::Cancelled | Error::SourceFetchFailed(_) => e,
        other => Error::SourceFetchFailed(other.to_string()),
    })?;
    if (field.width(), field.height()) != (request.width, request.height) {
        return Err(Error::SourceFetchFailed(format!(
            "requested {}x{} raster, got {}x{}",
            request.width,
            request.height,
            field.width(),
            field.height()
        )));
    }
    Ok(field)
}

fn abort_pending<P: Resources>(
    generations: &mut Vec<Generation<P>>,
    class: ResourceClass,
    events: &mut dyn EventSink,
) {
    generations.retain_mut(|g| {
        if !g.abort() {
            return true;
        }
        let id = g.id();
        debug!("Aborted {:?} generation {}.", class, id);
        emit(events, FlowEventKind::Aborted, || FlowEvent::Aborted { class, id });
        false
    });
}

fn apply_completion<P: Resources>(
    generations: &mut Vec<Generation<P>>,
    class: ResourceClass,
    id: GenerationId,
    result: Result<P>,
    events: &mut dyn EventSink,
) -> bool {
    let position = generations
        .iter()
        .position(|g| g.id() == id && !g.is_stale());
    let Some(position) = position else {
        debug!("Discarding stale {:?} completion {}.", class, id);
        emit(events, FlowEventKind::StaleDiscarded, || {
            FlowEvent::StaleDiscarded { class, id }
        });
        return false;
    };

    match result {
        Ok(payload) => {
            let ready = generations[position].complete(payload);
            if ready {
                info!("{:?} generation {} is ready.", class, id);
                emit(events, FlowEventKind::Ready, || FlowEvent::Ready { class, id });
            }
            ready
        }
        Err(Error::Cancelled) => {
            generations.remove(position);
            debug!("{:?} generation {} was cancelled.", class, id);
            emit(events, FlowEventKind::Aborted, || FlowEvent::Aborted { class, id });
            false
        }
        Err(error) => {
            generations.remove(position);
            warn!("{:?} generation {} failed: {}.", class, id, error);
            emit(events, FlowEventKind::Failed, || FlowEvent::Failed {
                class,
                id,
                error,
            });
            false
        }
    }
}

fn promote<P: Resources>(
    generations: &mut Vec<Generation<P>>,
    class: ResourceClass,
    sink: &mut dyn RenderSink,
    events: &mut dyn EventSink,
) -> bool {
    let mut changed = false;
    loop {
        let Some(newest) = generations
            .iter()
            .rposition(|g| g.is_ready() || g.is_attached())
        else {
            return changed;
        };

        match generations[newest].attach(sink) {
            Ok(newly_attached) => {
                let id = generations[newest].id();
                if newly_attached {
                    info!("Attached {:?} generation {}.", class, id);
                    emit(events, FlowEventKind::Attached, || FlowEvent::Attached {
                        class,
                        id,
                    });
                    changed = true;
                }
                for old in generations.drain(..newest) {
                    let old_id = old.id();
                    let was_attached = old.is_attached();
                    old.discard(sink);
                    if was_attached {
                        debug!("Detached {:?} generation {}.", class, old_id);
                    }
                    emit(events, FlowEventKind::Detached, || FlowEvent::Detached {
                        class,
                        id: old_id,
                    });
                    changed = true;
                }
                return changed;
            }
            Err(error) => {
                let failed = generations.remove(newest);
                let id = failed.id();
                failed.discard(sink);
                warn!("Attaching {:?} generation {} failed: {}.", class, id, error);
                emit(events, FlowEventKind::Failed, || FlowEvent::Failed {
                    class,
                    id,
                    error,
                });
                changed = true;
            }
        }
    }
}

fn release_all<P: Resources>(
    generations: &mut Vec<Generation<P>>,
    class: ResourceClass,
    sink: &mut dyn RenderSink,
    events: &mut dyn EventSink,
) {
    for generation in generations.drain(..) {
        let id = generation.id();
        let event = if generation.is_pending() {
            Some((FlowEventKind::Aborted, FlowEvent::Aborted { class, id }))
        } else if generation.is_attached() {
            Some((FlowEventKind::Detached, FlowEvent::Detached { class, id }))
        } else {
            None
        };
        generation.discard(sink);
        if let Some((kind, event)) = event {
            emit(events, kind, || event);
        }
    }
}
