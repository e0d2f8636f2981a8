//! Out-of-thread mesh worker and the messages exchanged with it.
//!
//! The worker owns a request channel. Every [`WorkerRequest::BuildMesh`] carries its own reply
//! sender, so a response can only reach the caller that submitted the request. The field buffer
//! is moved into the request and the finished vertex/index buffers are moved back.
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FlowConfig;
use crate::error::{Error, Result};
use crate::field::VectorField;
use crate::mesh::RibbonMesh;
use crate::offload::build_mesh;

/// Identifier of a single worker request.
pub type RequestId = u64;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// A raw field raster as it travels to the worker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldBuffer {
    pub width: usize,
    pub height: usize,
    /// Row-major, channel-interleaved `(u, v)` samples.
    pub buffer: Vec<f32>,
}

impl FieldBuffer {
    /// Validate the dimensions and turn the buffer back into a field.
    pub fn into_field(self) -> Result<VectorField> {
        VectorField::new(self.width, self.height, self.buffer)
    }
}

impl From<VectorField> for FieldBuffer {
    fn from(field: VectorField) -> Self {
        let (width, height) = (field.width(), field.height());
        Self {
            width,
            height,
            buffer: field.into_samples(),
        }
    }
}

/// Messages accepted by [`worker_loop`].
#[derive(Debug)]
pub enum WorkerRequest {
    BuildMesh {
        id: RequestId,
        field: FieldBuffer,
        smoothing: f32,
        /// Shared with the caller when both live in one process.
        token: Option<CancellationToken>,
        reply: Sender<WorkerResponse>,
    },
    Shutdown {
        ack: Sender<()>,
    },
}

impl WorkerRequest {
    /// The field buffer carried by a build request.
    pub fn into_field(self) -> Option<FieldBuffer> {
        match self {
            WorkerRequest::BuildMesh { field, .. } => Some(field),
            WorkerRequest::Shutdown { .. } => None,
        }
    }
}

/// Messages sent back by the worker.
#[derive(Debug)]
pub enum WorkerResponse {
    BuildMesh {
        id: RequestId,
        vertex_buffer: Vec<f32>,
        index_buffer: Vec<u32>,
    },
    Failed {
        id: RequestId,
        error: Error,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> RequestId {
        match self {
            WorkerResponse::BuildMesh { id, .. } | WorkerResponse::Failed { id, .. } => *id,
        }
    }
}

/// Serves mesh requests until a shutdown request arrives or every sender is gone.
///
/// [`MeshWorker::spawn`] runs this on a dedicated thread. Hosts that manage their own threads
/// can run it themselves and connect with [`MeshWorker::with_sender`].
pub fn worker_loop(rx: Receiver<WorkerRequest>, config: FlowConfig) {
    debug!("Mesh worker started.");

    while let Ok(request) = rx.recv() {
        match request {
            WorkerRequest::BuildMesh {
                id,
                field,
                smoothing,
                token,
                reply,
            } => {
                let token = token.unwrap_or_default();
                let response = match field
                    .into_field()
                    .and_then(|field| build_mesh(&field, smoothing, &config, &token))
                {
                    Ok(mesh) => {
                        let (vertex_buffer, index_buffer) = mesh.into_buffers();
                        WorkerResponse::BuildMesh {
                            id,
                            vertex_buffer,
                            index_buffer,
                        }
                    }
                    Err(error) => WorkerResponse::Failed { id, error },
                };
                if reply.send(response).is_err() {
                    debug!("Reply channel for request {} is closed; dropping result.", id);
                }
            }
            WorkerRequest::Shutdown { ack } => {
                debug!("Mesh worker received shutdown signal.");
                if ack.send(()).is_err() {
                    warn!("Mesh worker failed to acknowledge shutdown.");
                }
                break;
            }
        }
    }

    debug!("Mesh worker stopped.");
}

/// Handle to a mesh worker thread.
pub struct MeshWorker {
    tx: Sender<WorkerRequest>,
    handle: Option<JoinHandle<()>>,
    next_id: AtomicU64,
}

impl MeshWorker {
    /// Start [`worker_loop`] on a dedicated thread.
    pub fn spawn(config: FlowConfig) -> Result<Self> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("map_flow-mesh-worker".into())
            .spawn(move || worker_loop(rx, config))
            .map_err(|e| Error::OffloadChannelFailed(format!("failed to spawn worker: {e}")))?;
        Ok(Self {
            tx,
            handle: Some(handle),
            next_id: AtomicU64::new(1),
        })
    }

    /// Connect to a worker loop that is run elsewhere.
    pub fn with_sender(tx: Sender<WorkerRequest>) -> Self {
        Self {
            tx,
            handle: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Move `field` to the worker.
    ///
    /// When the worker is gone the request comes back inside the error, so the caller can
    /// recover the field buffer with [`WorkerRequest::into_field`].
    pub fn submit(
        &self,
        field: VectorField,
        smoothing: f32,
        token: Option<CancellationToken>,
    ) -> std::result::Result<PendingMesh, SendError<WorkerRequest>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = bounded(1);
        self.tx.send(WorkerRequest::BuildMesh {
            id,
            field: field.into(),
            smoothing,
            token,
            reply,
        })?;
        Ok(PendingMesh { id, rx })
    }
}

impl Drop for MeshWorker {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let (ack, ack_rx) = bounded(1);
        if self.tx.send(WorkerRequest::Shutdown { ack }).is_ok()
            && ack_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err()
        {
            warn!("Mesh worker did not acknowledge shutdown; detaching thread.");
            return;
        }
        if handle.join().is_err() {
            warn!("Mesh worker thread panicked.");
        }
    }
}

/// A request accepted by the worker whose response has not been received yet.
#[derive(Debug)]
pub struct PendingMesh {
    id: RequestId,
    rx: Receiver<WorkerResponse>,
}

impl PendingMesh {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Block until the response arrives, checking `token` every `tick`.
    ///
    /// Fails with [`Error::Cancelled`] once the token is cancelled and with
    /// [`Error::OffloadChannelFailed`] when the worker drops the request.
    pub fn wait(self, token: &CancellationToken, tick: Duration) -> Result<RibbonMesh> {
        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.rx.recv_timeout(tick) {
                Ok(WorkerResponse::BuildMesh {
                    id,
                    vertex_buffer,
                    index_buffer,
                }) if id == self.id => {
                    return Ok(RibbonMesh {
                        vertices: vertex_buffer,
                        indices: index_buffer,
                    });
                }
                Ok(WorkerResponse::Failed { id, error }) if id == self.id => return Err(error),
                Ok(other) => {
                    debug!(
                        "Discarding response for request {} while waiting for {}.",
                        other.id(),
                        self.id
                    );
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::OffloadChannelFailed(format!(
                        "worker dropped request {}",
                        self.id
                    )));
                }
            }
        }
    }
}
