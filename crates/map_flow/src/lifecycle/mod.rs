//! Generation lifecycle: viewport geometry, resource payloads, events and the manager that
//! moves generations from request to attachment.
pub mod events;
pub mod generation;
pub mod manager;
pub mod resources;
pub mod viewport;

pub use events::{
    ChannelSink, EventSink, FlowEvent, FlowEventKind, FnSink, MultiSink, ResourceClass, VecSink,
};
pub use generation::{Generation, GenerationId, GenerationState};
pub use manager::{Completion, Dispatch, FlowLifecycle, RenderOutcome};
pub use resources::{
    ColorStop, FlowStyle, MeshHandle, MeshResources, RecordingSink, RenderSink, Resources,
    SharedHandle, SharedPayload, SharedResources, SinkCall,
};
pub use viewport::{Extent, FieldAnchor, FrameContext, RenderParams, Viewport};
