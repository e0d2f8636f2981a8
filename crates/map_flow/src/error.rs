//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration and input, cooperative cancellation, failures of the field source,
//! the offload channel and the rendering sink, and generic errors.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Cooperative outcome of a cancelled computation; not a failure.
    #[error("cancelled")]
    Cancelled,

    #[error("field source fetch failed: {0}")]
    SourceFetchFailed(String),

    #[error("offload channel failed: {0}")]
    OffloadChannelFailed(String),

    #[error("mesh generation failed: {0}")]
    Failed(String),

    #[error("render sink error: {0}")]
    Sink(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns `true` for the cooperative [`Error::Cancelled`] outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_uses_other_variant() {
        let err: Error = String::from("boom").into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn from_str_allocates_owned_message() {
        let err: Error = "issue".into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "issue"));
    }

    #[test]
    fn only_cancelled_reports_cancellation() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Failed("x".into()).is_cancelled());
        assert_eq!(
            Error::InvalidInput("bad dims".into()).to_string(),
            "invalid input: bad dims"
        );
    }
}
