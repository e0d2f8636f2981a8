//! Event types and sinks for observing the generation lifecycle.
//!
//! [`crate::lifecycle::FlowLifecycle`] reports every state transition as a [`FlowEvent`] to its
//! configured [`EventSink`]. Sinks can collect events, forward them to a closure, fan them out,
//! or push them over a channel to another thread.
use crossbeam_channel::Sender;

use crate::error::Error;
use crate::lifecycle::generation::GenerationId;

/// Resource class a generation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// Long-lived, viewport-independent resources.
    Shared,
    /// Resources built for one viewport state.
    Local,
}

/// Describes transitions of resource generations.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// A new generation was created in the pending state.
    Requested { class: ResourceClass, id: GenerationId },
    /// A pending generation was cancelled before completing.
    Aborted { class: ResourceClass, id: GenerationId },
    /// A completion arrived for a generation that is gone or was cancelled.
    StaleDiscarded { class: ResourceClass, id: GenerationId },
    /// A generation finished computing and is ready to attach.
    Ready { class: ResourceClass, id: GenerationId },
    /// A generation was handed to the render sink.
    Attached { class: ResourceClass, id: GenerationId },
    /// A generation was released from the render sink.
    Detached { class: ResourceClass, id: GenerationId },
    /// A generation failed; whatever was attached before keeps rendering.
    Failed {
        class: ResourceClass,
        id: GenerationId,
        error: Error,
    },
}

/// Discriminant of a [`FlowEvent`], used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowEventKind {
    Requested,
    Aborted,
    StaleDiscarded,
    Ready,
    Attached,
    Detached,
    Failed,
}

impl FlowEvent {
    pub fn kind(&self) -> FlowEventKind {
        match self {
            FlowEvent::Requested { .. } => FlowEventKind::Requested,
            FlowEvent::Aborted { .. } => FlowEventKind::Aborted,
            FlowEvent::StaleDiscarded { .. } => FlowEventKind::StaleDiscarded,
            FlowEvent::Ready { .. } => FlowEventKind::Ready,
            FlowEvent::Attached { .. } => FlowEventKind::Attached,
            FlowEvent::Detached { .. } => FlowEventKind::Detached,
            FlowEvent::Failed { .. } => FlowEventKind::Failed,
        }
    }

    pub fn class(&self) -> ResourceClass {
        match self {
            FlowEvent::Requested { class, .. }
            | FlowEvent::Aborted { class, .. }
            | FlowEvent::StaleDiscarded { class, .. }
            | FlowEvent::Ready { class, .. }
            | FlowEvent::Attached { class, .. }
            | FlowEvent::Detached { class, .. }
            | FlowEvent::Failed { class, .. } => *class,
        }
    }

    pub fn id(&self) -> GenerationId {
        match self {
            FlowEvent::Requested { id, .. }
            | FlowEvent::Aborted { id, .. }
            | FlowEvent::StaleDiscarded { id, .. }
            | FlowEvent::Ready { id, .. }
            | FlowEvent::Attached { id, .. }
            | FlowEvent::Detached { id, .. }
            | FlowEvent::Failed { id, .. } => *id,
        }
    }
}

/// A generic event sink that accepts [`FlowEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: FlowEvent);

    /// Whether events of `kind` should be built and sent at all.
    fn wants(&self, _kind: FlowEventKind) -> bool {
        true
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: FlowEvent) {}

    #[inline]
    fn wants(&self, _kind: FlowEventKind) -> bool {
        false
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(FlowEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(FlowEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(FlowEvent),
{
    #[inline]
    fn send(&mut self, event: FlowEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<FlowEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<FlowEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[FlowEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: FlowEvent) {
        self.events.push(event);
    }
}

/// Event sink that forwards events over a channel, optionally filtered by kind.
pub struct ChannelSink {
    pub tx: Sender<FlowEvent>,
    pub filter: Option<Vec<FlowEventKind>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<FlowEvent>) -> Self {
        Self { tx, filter: None }
    }

    /// Only forward the given kinds.
    pub fn with_filter(mut self, kinds: Vec<FlowEventKind>) -> Self {
        self.filter = Some(kinds);
        self
    }
}

impl EventSink for ChannelSink {
    #[inline]
    fn send(&mut self, event: FlowEvent) {
        let _ = self.tx.send(event);
    }

    fn wants(&self, kind: FlowEventKind) -> bool {
        self.filter.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: FlowEvent) {
        let kind = event.kind();
        for sink in self.sinks.iter_mut().filter(|s| s.wants(kind)) {
            sink.send(event.clone());
        }
    }

    fn wants(&self, kind: FlowEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(id: GenerationId) -> FlowEvent {
        FlowEvent::Ready {
            class: ResourceClass::Local,
            id,
        }
    }

    #[test]
    fn event_accessors_report_kind_class_and_id() {
        let event = FlowEvent::Failed {
            class: ResourceClass::Shared,
            id: 4,
            error: Error::Failed("x".into()),
        };
        assert_eq!(event.kind(), FlowEventKind::Failed);
        assert_eq!(event.class(), ResourceClass::Shared);
        assert_eq!(event.id(), 4);
    }

    #[test]
    fn vec_sink_collects_events() {
        let mut sink = VecSink::new();
        assert!(sink.is_empty());
        sink.send(ready(1));
        sink.send(ready(2));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.as_slice()[1].id(), 2);
    }

    #[test]
    fn unit_sink_wants_nothing() {
        assert!(!().wants(FlowEventKind::Ready));
    }

    #[test]
    fn channel_sink_respects_filter() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ChannelSink::new(tx).with_filter(vec![FlowEventKind::Attached]);
        assert!(sink.wants(FlowEventKind::Attached));
        assert!(!sink.wants(FlowEventKind::Ready));

        let mut sink = sink;
        sink.send(ready(3));
        assert_eq!(rx.try_recv().unwrap().id(), 3);
    }

    #[test]
    fn multi_sink_fans_out_events() {
        let mut multi = MultiSink::with_sinks(vec![VecSink::new(), VecSink::new()]);
        multi.send(ready(9));
        assert_eq!(multi.sinks[0].len(), 1);
        assert_eq!(multi.sinks[1].len(), 1);
    }

    #[test]
    fn fn_sink_invokes_callback() {
        let mut count = 0;
        let mut sink = FnSink::new(|_event| {
            count += 1;
        });
        sink.send(ready(1));
        assert_eq!(count, 1);
    }
}
