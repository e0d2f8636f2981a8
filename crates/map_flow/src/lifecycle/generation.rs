//! A single versioned resource instance and its state.
use std::mem;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::lifecycle::resources::{RenderSink, Resources};

/// Monotonic identifier of a generation within one lifecycle.
pub type GenerationId = u64;

/// State of a [`Generation`].
#[derive(Debug)]
pub enum GenerationState<P> {
    /// Being computed; cancelling the token aborts the job.
    Pending(CancellationToken),
    /// Computed, not yet handed to the sink.
    Ready(P),
    /// Handed to the sink and renderable.
    Attached(P),
    /// Cancelled before completion. Terminal.
    Aborted,
}

/// One versioned resource instance.
#[derive(Debug)]
pub struct Generation<P> {
    id: GenerationId,
    state: GenerationState<P>,
}

impl<P: Resources> Generation<P> {
    /// Creates a pending generation and returns the token its job should observe.
    pub fn pending(id: GenerationId) -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        let generation = Self {
            id,
            state: GenerationState::Pending(token.clone()),
        };
        (generation, token)
    }

    pub fn id(&self) -> GenerationId {
        self.id
    }

    pub fn state(&self) -> &GenerationState<P> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, GenerationState::Pending(_))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GenerationState::Ready(_))
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, GenerationState::Attached(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, GenerationState::Aborted)
    }

    /// Whether a completion for this generation must be ignored.
    pub fn is_stale(&self) -> bool {
        match &self.state {
            GenerationState::Pending(token) => token.is_cancelled(),
            _ => true,
        }
    }

    /// The payload once computed.
    pub fn payload(&self) -> Option<&P> {
        match &self.state {
            GenerationState::Ready(p) | GenerationState::Attached(p) => Some(p),
            _ => None,
        }
    }

    /// The payload if it is attached.
    pub fn attached(&self) -> Option<&P> {
        match &self.state {
            GenerationState::Attached(p) => Some(p),
            _ => None,
        }
    }

    /// Pending -> Ready. Returns `false` (dropping `payload`) when the generation is not
    /// pending or its token was cancelled.
    pub fn complete(&mut self, payload: P) -> bool {
        if self.is_stale() {
            return false;
        }
        self.state = GenerationState::Ready(payload);
        true
    }

    /// Ready -> Attached. Returns `Ok(true)` when the payload was newly attached.
    ///
    /// On error the generation stays ready, although the payload may have given up its
    /// buffers to the failed sink call.
    pub fn attach(&mut self, sink: &mut dyn RenderSink) -> Result<bool> {
        match mem::replace(&mut self.state, GenerationState::Aborted) {
            GenerationState::Ready(mut payload) => match payload.attach(sink) {
                Ok(()) => {
                    self.state = GenerationState::Attached(payload);
                    Ok(true)
                }
                Err(e) => {
                    self.state = GenerationState::Ready(payload);
                    Err(e)
                }
            },
            other => {
                self.state = other;
                Ok(false)
            }
        }
    }

    /// Pending -> Aborted, cancelling the job. Returns `false` in any other state.
    pub fn abort(&mut self) -> bool {
        if let GenerationState::Pending(token) = &self.state {
            token.cancel();
            self.state = GenerationState::Aborted;
            true
        } else {
            false
        }
    }

    /// Release everything this generation holds: cancel if pending, detach if attached.
    pub fn discard(mut self, sink: &mut dyn RenderSink) {
        match &mut self.state {
            GenerationState::Pending(token) => token.cancel(),
            GenerationState::Attached(payload) => payload.detach(sink),
            GenerationState::Ready(_) | GenerationState::Aborted => {}
        }
    }
}
