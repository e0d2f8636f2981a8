//! Running the smooth, trace and tessellate pipeline as one cancellable unit of work.
//!
//! [`build_mesh`] is the pipeline itself. [`OffloadCoordinator`] decides where it runs: on the
//! calling thread, or on a [`worker::MeshWorker`] with a transparent inline fallback when the
//! worker cannot accept the request.
pub mod rest;
pub mod worker;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FlowConfig;
use crate::error::{Error, Result};
use crate::field::{FieldSmoother, VectorField};
use crate::mesh::{RibbonMesh, RibbonMeshBuilder};
use crate::offload::rest::RestPoint;
use crate::offload::worker::MeshWorker;
use crate::random::DeterministicRandom;
use crate::streamline::StreamlineTracer;

/// Smooth `field`, trace `config.streamline_count` streamlines through it and tessellate them.
///
/// Seeding and phase jitter draw from one generator seeded with `config.seed`, so equal inputs
/// give equal meshes. Cancellation is observed between stages and between streamlines.
pub fn build_mesh(
    field: &VectorField,
    smoothing: f32,
    config: &FlowConfig,
    token: &CancellationToken,
) -> Result<RibbonMesh> {
    let mut rest = RestPoint::new(token, config.rest_interval);
    rest.check()?;

    let smoothed = FieldSmoother::new(smoothing)
        .with_min_weight(config.min_weight)
        .smooth(field)?;
    rest.check()?;

    let mut rng = DeterministicRandom::new(config.seed);
    let lines = StreamlineTracer::from_config(config).trace_batch(
        &smoothed,
        config.streamline_count,
        &mut rng,
        &mut rest,
    )?;
    rest.check()?;

    let (mesh, stats) = RibbonMeshBuilder::from_config(config).build_with_stats(&lines, &mut rng);
    debug!(
        "Built {}x{} mesh | streamlines: {}, segments: {}, skipped: {}, rests: {}.",
        field.width(),
        field.height(),
        stats.streamlines,
        stats.segments,
        stats.skipped_segments,
        rest.rests(),
    );
    Ok(mesh)
}

/// Runs [`build_mesh`] inline or on a worker thread.
pub struct OffloadCoordinator {
    config: FlowConfig,
    worker: Option<MeshWorker>,
}

impl OffloadCoordinator {
    /// A coordinator that always runs on the calling thread.
    pub fn inline(config: FlowConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }

    /// A coordinator backed by a freshly spawned [`MeshWorker`].
    pub fn with_worker(config: FlowConfig) -> Result<Self> {
        config.validate()?;
        let worker = MeshWorker::spawn(config.clone())?;
        Ok(Self::with_mesh_worker(config, worker))
    }

    /// A coordinator backed by an existing worker.
    pub fn with_mesh_worker(config: FlowConfig, worker: MeshWorker) -> Self {
        Self {
            config,
            worker: Some(worker),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Build a mesh for `field`.
    ///
    /// With a worker, the field is moved into the request and the call blocks until the reply
    /// arrives, checking `token` every `rest_interval`. If the worker cannot accept the request
    /// the field is recovered and the mesh is built inline. If the worker drops an accepted
    /// request the field is gone and [`Error::OffloadChannelFailed`] is returned.
    pub fn run(
        &self,
        field: VectorField,
        smoothing: f32,
        token: &CancellationToken,
    ) -> Result<RibbonMesh> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(worker) = &self.worker else {
            return self.run_inline(field, smoothing, token);
        };

        match worker.submit(field, smoothing, Some(token.clone())) {
            Ok(pending) => pending.wait(token, self.config.rest_interval),
            Err(err) => {
                warn!("Mesh worker is unavailable; running inline.");
                let buffer = err.0.into_field().ok_or_else(|| {
                    Error::OffloadChannelFailed("rejected request carried no field".into())
                })?;
                self.run_inline(buffer.into_field()?, smoothing, token)
            }
        }
    }

    /// Build a mesh for `field` on the calling thread.
    pub fn run_inline(
        &self,
        field: VectorField,
        smoothing: f32,
        token: &CancellationToken,
    ) -> Result<RibbonMesh> {
        build_mesh(&field, smoothing, &self.config, token)
    }
}
