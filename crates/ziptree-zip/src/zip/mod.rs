//! ZIP format structures.
//!
//! This module contains the low-level record layouts of a single-disk,
//! non-ZIP64 archive: the end of central directory record, central
//! directory headers and local file headers.

pub mod central_dir;
pub mod eocd;
pub mod local;

pub use central_dir::CentralDirectoryHeader;
pub use eocd::{EndOfCentralDirectory, EocdRecord};
pub use local::LocalFileHeader;

/// "2.0": the minimum version that understands DEFLATE and directories.
pub const VERSION_20: u16 = 20;

/// Host system byte written into "version made by" (3 = Unix).
pub const HOST_UNIX: u16 = 3;

/// Compression methods understood by the reader.
///
/// Only [`Stored`](Self::Stored) and [`Deflated`](Self::Deflated) can be
/// extracted. Other method codes registered in the ZIP application note are
/// kept as [`Unsupported`](Self::Unsupported) so they fail at extraction
/// time; codes that are not registered at all are rejected while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression (stored).
    Stored,
    /// DEFLATE compression.
    Deflated,
    /// A registered method this crate cannot extract.
    Unsupported(u16),
}

impl CompressionMethod {
    /// The method code as stored on disk.
    pub fn code(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflated => 8,
            Self::Unsupported(code) => code,
        }
    }
}

impl TryFrom<u16> for CompressionMethod {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Stored),
            8 => Ok(Self::Deflated),
            // shrunk, reduced 1-4, imploded, tokenized, deflate64, PKWARE DCL,
            // bzip2, LZMA, IBM z/OS CMPSC, IBM TERSE, LZ77, zstd, MP3, xz,
            // JPEG, WavPack, PPMd, AE-x
            1..=7 | 9 | 10 | 12 | 14 | 16 | 18 | 19 | 93 | 94 | 95 | 96 | 97 | 98 | 99 => {
                Ok(Self::Unsupported(value))
            }
            other => Err(other),
        }
    }
}

/// General purpose bit flags of a local or central header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GeneralPurposeFlags(u16);

impl GeneralPurposeFlags {
    /// Bit 0: the entry is encrypted.
    pub const ENCRYPTED: Self = Self(1 << 0);
    /// Bit 3: CRC and sizes follow the data in a data descriptor.
    pub const DATA_DESCRIPTOR: Self = Self(1 << 3);
    /// Bit 6: strong encryption.
    pub const STRONG_ENCRYPTION: Self = Self(1 << 6);
    /// Bit 11: name and comment are UTF-8.
    pub const UTF8: Self = Self(1 << 11);
    /// Bit 13: local header values are masked because the central directory is encrypted.
    pub const MASKED_HEADERS: Self = Self(1 << 13);

    /// Wrap raw flag bits.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check whether every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any form of encryption is flagged.
    #[inline]
    pub const fn is_encrypted(self) -> bool {
        self.0 & (Self::ENCRYPTED.0 | Self::STRONG_ENCRYPTION.0 | Self::MASKED_HEADERS.0) != 0
    }
}

impl std::ops::BitOr for GeneralPurposeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_codes() {
        assert_eq!(CompressionMethod::try_from(0), Ok(CompressionMethod::Stored));
        assert_eq!(CompressionMethod::try_from(8), Ok(CompressionMethod::Deflated));
        assert_eq!(
            CompressionMethod::try_from(12),
            Ok(CompressionMethod::Unsupported(12))
        );
        assert_eq!(CompressionMethod::try_from(42), Err(42));
        assert_eq!(CompressionMethod::Unsupported(14).code(), 14);
    }

    #[test]
    fn test_flags() {
        let flags = GeneralPurposeFlags::from_bits(0x0808);
        assert!(flags.contains(GeneralPurposeFlags::UTF8));
        assert!(flags.contains(GeneralPurposeFlags::DATA_DESCRIPTOR));
        assert!(!flags.is_encrypted());
        assert!(GeneralPurposeFlags::from_bits(1).is_encrypted());
        assert_eq!(
            (GeneralPurposeFlags::UTF8 | GeneralPurposeFlags::ENCRYPTED).bits(),
            0x0801
        );
    }
}
