//! Error types for the rasterization pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing and rasterizing a vector document
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (unknown format, bad selector, unresolvable inject target, ...)
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The injected renderer rejected
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The renderer resolved but left no `<svg>` element in the container
    #[error("No vector root rendered: {0}")]
    MissingOutput(String),

    /// Live tree and clone are not congruent. This is a defect, not a runtime condition.
    #[error("Structural mismatch at {path}: source has {source_children} element children, clone has {target_children}")]
    StructuralMismatch {
        /// Child-index path from the captured root, e.g. `svg/0/2`
        path: String,
        source_children: usize,
        target_children: usize,
    },

    /// The serialized payload could not be decoded as an image
    #[error("Failed to decode vector payload: {0}")]
    DecodeError(String),

    /// The pixel surface could not be encoded
    #[error("Could not encode image: {0}")]
    EncodeError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Render,
    MissingOutput,
    StructuralMismatch,
    Decode,
    Encode,
    Timeout,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigError(_) => ErrorKind::Config,
            Error::RenderError(_) => ErrorKind::Render,
            Error::MissingOutput(_) => ErrorKind::MissingOutput,
            Error::StructuralMismatch { .. } => ErrorKind::StructuralMismatch,
            Error::DecodeError(_) => ErrorKind::Decode,
            Error::EncodeError(_) => ErrorKind::Encode,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::RenderError(format!("{:#}", err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Other(format!("Worker task failed: {}", err))
    }
}
