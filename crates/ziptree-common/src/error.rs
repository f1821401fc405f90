//! Error types for ziptree-common.

use std::io;

use thiserror::Error;

/// Broad classification shared by every ziptree error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The bytes violate the container format (bad magic, truncated data, length mismatch).
    InvalidFormat,
    /// The bytes are well-formed but use a feature that is not implemented.
    UnsupportedFormat,
    /// A file at the I/O boundary does not exist.
    FileNotFound,
    /// A progress callback requested cancellation.
    Canceled,
    /// The output device ran out of space.
    DiskFull,
    /// An allocation failed.
    OutOfMemory,
    /// The compression codec reported an internal failure.
    CodecFailure,
}

impl ErrorKind {
    /// Classify an I/O error raised at the filesystem boundary.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound,
            io::ErrorKind::StorageFull => Self::DiskFull,
            io::ErrorKind::OutOfMemory => Self::OutOfMemory,
            _ => Self::InvalidFormat,
        }
    }
}

/// Common error type for binary reading and writing.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Invalid magic bytes encountered.
    #[error("invalid magic: expected {expected:02x?}, got {actual:02x?}")]
    InvalidMagic { expected: Vec<u8>, actual: Vec<u8> },

    /// Missing null terminator in string.
    #[error("string missing null terminator")]
    MissingNullTerminator,

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Text that cannot be represented in the legacy 8-bit encoding.
    #[error("text cannot be encoded as an 8-bit name: {0:?}")]
    Unencodable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Get the broad error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unencodable(_) => ErrorKind::UnsupportedFormat,
            Self::Io(err) => ErrorKind::from_io(err),
            Self::UnexpectedEof { .. }
            | Self::InvalidMagic { .. }
            | Self::MissingNullTerminator
            | Self::Utf8(_) => ErrorKind::InvalidFormat,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(ErrorKind::from_io(&missing), ErrorKind::FileNotFound);

        let full = io::Error::new(io::ErrorKind::StorageFull, "full");
        assert_eq!(Error::Io(full).kind(), ErrorKind::DiskFull);
    }

    #[test]
    fn test_format_errors_are_invalid_format() {
        let err = Error::UnexpectedEof {
            offset: 0,
            needed: 4,
            available: 1,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert_eq!(Error::MissingNullTerminator.kind(), ErrorKind::InvalidFormat);
        assert_eq!(
            Error::Unencodable("\u{4e16}".into()).kind(),
            ErrorKind::UnsupportedFormat
        );
    }
}
