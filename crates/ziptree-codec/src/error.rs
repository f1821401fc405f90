//! Error types for the codec crate.

use thiserror::Error;
use ziptree_common::ErrorKind;

/// Errors reported by a [`Codec`](crate::Codec).
#[derive(Debug, Error)]
pub enum Error {
    /// The progress callback asked for the operation to stop.
    #[error("operation canceled")]
    Canceled,

    /// The compressed stream ended before its final block.
    #[error("compressed stream is truncated")]
    Truncated,

    /// Decompression produced more bytes than the caller allowed.
    #[error("decompressed output exceeds {limit} bytes")]
    LimitExceeded { limit: usize },

    /// The underlying codec reported a failure. The message is the codec's own.
    #[error("codec failure: {0}")]
    Codec(String),
}

impl Error {
    /// Get the broad error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Canceled => ErrorKind::Canceled,
            Self::Truncated | Self::LimitExceeded { .. } => ErrorKind::InvalidFormat,
            Self::Codec(_) => ErrorKind::CodecFailure,
        }
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
