#![forbid(unsafe_code)]
//! map_flow: Animated flow visualization from raster vector fields.
//!
//! Modules:
//! - field: vector field rasters, nearest-cell sampling, Gaussian smoothing and the source interface
//! - streamline: forward Euler streamline tracing
//! - mesh: tessellation of streamlines into an animated ribbon mesh
//! - offload: the cancellable mesh pipeline, inline or on a worker thread
//! - lifecycle: generations of shared and local resources, supersession and rendering
//!
//! For examples and docs, see README and docs.rs.
pub mod config;
pub mod error;
pub mod field;
pub mod lifecycle;
pub mod mesh;
pub mod offload;
pub mod random;
pub mod streamline;

/// Convenient re-exports for common types. Import with `use map_flow::prelude::*;`.
pub mod prelude {
    pub use crate::config::FlowConfig;
    pub use crate::error::{Error, Result};
    pub use crate::field::{
        FieldRequest, FieldSample, FieldSmoother, FieldSource, FnSource, SmoothedField,
        VectorField,
    };
    pub use crate::lifecycle::{
        ChannelSink, ColorStop, Completion, Dispatch, EventSink, Extent, FieldAnchor, FlowEvent,
        FlowEventKind, FlowLifecycle, FlowStyle, FnSink, FrameContext, Generation, GenerationId,
        GenerationState, MeshHandle, MeshResources, MultiSink, RecordingSink, RenderOutcome,
        RenderParams, RenderSink, ResourceClass, Resources, SharedHandle, SharedPayload,
        SharedResources, SinkCall, VecSink, Viewport,
    };
    pub use crate::mesh::{MeshStats, RibbonMesh, RibbonMeshBuilder, RibbonVertex};
    pub use crate::offload::worker::{MeshWorker, PendingMesh};
    pub use crate::offload::{build_mesh, OffloadCoordinator};
    pub use crate::random::DeterministicRandom;
    pub use crate::streamline::{Streamline, StreamlineTracer, StreamlineVertex};
}
