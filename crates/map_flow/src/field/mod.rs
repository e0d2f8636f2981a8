//! Vector field storage, sampling, smoothing and the field source interface.
pub mod raster;
pub mod smooth;
pub mod source;

pub use raster::{FieldSample, SmoothedField, VectorField};
pub use smooth::FieldSmoother;
pub use source::{FieldRequest, FieldSource, FnSource};
