//! Error types for the ZIP crate.

use thiserror::Error;
use ziptree_common::ErrorKind;

use crate::zip::CompressionMethod;

/// Errors that can occur when reading or writing ZIP archives.
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

    /// Invalid ZIP magic bytes.
    #[error("invalid ZIP signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// Could not find the end of central directory record.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// The archive spans several disks.
    #[error("multi-disk archives are not supported (disk {disk}, central directory on disk {central_dir_disk})")]
    MultiDisk { disk: u16, central_dir_disk: u16 },

    /// The archive needs ZIP64 extensions.
    #[error("ZIP64 archives are not supported")]
    Zip64,

    /// A compression method code that is not registered at all.
    #[error("unknown compression method: {0}")]
    UnknownCompression(u16),

    /// A registered compression method that cannot be extracted.
    #[error("unsupported compression method: {}", .0.code())]
    UnsupportedCompression(CompressionMethod),

    /// The entry is encrypted.
    #[error("entry is encrypted: {0}")]
    Encrypted(String),

    /// The central directory does not end where the EOCD says it does.
    #[error("central directory ends at {actual}, expected {expected}")]
    CentralDirectoryMismatch { expected: u64, actual: u64 },

    /// Entry data lies outside the archive.
    #[error("entry {name:?} spans {start}..{end} but the archive has {len} bytes")]
    EntryOutOfBounds {
        name: String,
        start: u64,
        end: u64,
        len: usize,
    },

    /// Inflated length differs from the recorded size.
    #[error("entry {name:?} inflated to {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// Inflation passed the recorded size and was stopped.
    #[error("entry {name:?} inflates past its recorded {expected} bytes")]
    SizeExceeded { name: String, expected: u64 },

    /// CRC-32 of the inflated data differs from the recorded value.
    #[error("entry {name:?} has CRC-32 {actual:#010x}, expected {expected:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// A path is used both as a file and as a directory, or twice as a file.
    #[error("conflicting archive path: {0}")]
    PathConflict(String),

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// A name that cannot be stored.
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    /// Too many entries for a 16-bit count.
    #[error("too many entries: {0} (at most 65535)")]
    TooManyEntries(usize),

    /// A size or offset does not fit in 32 bits.
    #[error("{what} of {value} does not fit in 32 bits")]
    TooLarge { what: &'static str, value: u64 },

    /// Archive comment longer than 65535 bytes.
    #[error("archive comment of {0} bytes is too long")]
    CommentTooLong(usize),
}

impl Error {
    /// Get the broad error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(err) => ErrorKind::from_io(err),
            Self::Common(err) => err.kind(),
            Self::Codec(err) => err.kind(),
            Self::InvalidSignature { .. }
            | Self::EocdNotFound
            | Self::UnknownCompression(_)
            | Self::CentralDirectoryMismatch { .. }
            | Self::EntryOutOfBounds { .. }
            | Self::SizeMismatch { .. }
            | Self::SizeExceeded { .. }
            | Self::ChecksumMismatch { .. }
            | Self::PathConflict(_) => ErrorKind::InvalidFormat,
            Self::EntryNotFound(_) => ErrorKind::FileNotFound,
            Self::MultiDisk { .. }
            | Self::Zip64
            | Self::UnsupportedCompression(_)
            | Self::Encrypted(_)
            | Self::InvalidName(_)
            | Self::TooManyEntries(_)
            | Self::TooLarge { .. }
            | Self::CommentTooLong(_) => ErrorKind::UnsupportedFormat,
        }
    }
}

/// Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::EocdNotFound.kind(), ErrorKind::InvalidFormat);
        assert_eq!(Error::UnknownCompression(42).kind(), ErrorKind::InvalidFormat);
        assert_eq!(
            Error::UnsupportedCompression(CompressionMethod::Unsupported(12)).kind(),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            Error::Codec(ziptree_codec::Error::Canceled).kind(),
            ErrorKind::Canceled
        );
        assert_eq!(
            Error::EntryNotFound("x".into()).kind(),
            ErrorKind::FileNotFound
        );
    }
}
