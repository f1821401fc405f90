//! Error types for the GZIP crate.

use thiserror::Error;
use ziptree_common::ErrorKind;

/// Errors that can occur when reading or writing GZIP files.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] ziptree_common::Error),

    /// Codec error.
    #[error("{0}")]
    Codec(#[from] ziptree_codec::Error),

    /// Compression method other than DEFLATE.
    #[error("invalid GZIP compression method: {0}")]
    InvalidMethod(u8),

    /// Reserved flag bits are set.
    #[error("reserved GZIP flag bits set: {0:#04x}")]
    ReservedFlags(u8),

    /// The optional header CRC does not match the header.
    #[error("GZIP header CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    HeaderChecksum { expected: u16, actual: u16 },
}

impl Error {
    /// Get the broad error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(err) => ErrorKind::from_io(err),
            Self::Common(err) => err.kind(),
            Self::Codec(err) => err.kind(),
            Self::InvalidMethod(_) | Self::ReservedFlags(_) | Self::HeaderChecksum { .. } => {
                ErrorKind::InvalidFormat
            }
        }
    }
}

/// Result type for GZIP operations.
pub type Result<T> = std::result::Result<T, Error>;
