//! Field data source collaborator.
//!
//! The lifecycle manager asks a [`FieldSource`] for the raster covering the expanded viewport
//! extent. Sources deliver `(u, v)` samples in a common convention; any magnitude/direction
//! decoding happens before data reaches this crate.
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::field::raster::VectorField;
use crate::lifecycle::viewport::Extent;

/// Parameters of a single field fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRequest {
    /// Map extent the raster must cover.
    pub extent: Extent,
    /// Raster width in cells.
    pub width: usize,
    /// Raster height in cells.
    pub height: usize,
}

/// Fetches vector field rasters.
///
/// Implementations should return [`crate::error::Error::SourceFetchFailed`] on failure and
/// [`crate::error::Error::Cancelled`] once they notice `token` was cancelled.
pub trait FieldSource: Send + Sync {
    fn fetch(&self, request: &FieldRequest, token: &CancellationToken) -> Result<VectorField>;
}

/// A source backed by a closure, handy for synthetic fields.
pub struct FnSource<F>
where
    F: Fn(&FieldRequest) -> Result<VectorField> + Send + Sync,
{
    f: F,
}

impl<F> FnSource<F>
where
    F: Fn(&FieldRequest) -> Result<VectorField> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> FieldSource for FnSource<F>
where
    F: Fn(&FieldRequest) -> Result<VectorField> + Send + Sync,
{
    fn fetch(&self, request: &FieldRequest, token: &CancellationToken) -> Result<VectorField> {
        if token.is_cancelled() {
            return Err(crate::error::Error::Cancelled);
        }
        (self.f)(request)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::error::Error;

    fn request() -> FieldRequest {
        FieldRequest {
            extent: Extent::new(0.0, 0.0, 4.0, 2.0),
            width: 4,
            height: 2,
        }
    }

    #[test]
    fn fn_source_builds_requested_size() {
        let source = FnSource::new(|req: &FieldRequest| {
            Ok(VectorField::constant(req.width, req.height, Vec2::X))
        });
        let field = source.fetch(&request(), &CancellationToken::new()).unwrap();
        assert_eq!((field.width(), field.height()), (4, 2));
    }

    #[test]
    fn fn_source_observes_cancellation() {
        let source = FnSource::new(|req: &FieldRequest| {
            Ok(VectorField::constant(req.width, req.height, Vec2::X))
        });
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            source.fetch(&request(), &token),
            Err(Error::Cancelled)
        ));
    }
}
