//! DEFLATE codec port for ziptree.
//!
//! The container crates never touch entropy coding themselves. They frame
//! byte ranges and hand them to a [`Codec`], which compresses or
//! decompresses in fixed-size chunks, reports progress once per chunk and
//! honours cancellation between chunks.
//!
//! [`FlateCodec`] is the production implementation, backed by `flate2`.
//!
//! # Example
//!
//! ```
//! use ziptree_codec::{Codec, FlateCodec, WindowMode};
//!
//! let codec = FlateCodec::default();
//! let packed = codec.compress(b"hello hello hello", WindowMode::Raw, None)?;
//! let unpacked = codec.decompress(&packed.data, WindowMode::Raw, None)?;
//! assert_eq!(unpacked, b"hello hello hello");
//! assert_eq!(packed.crc32, ziptree_codec::crc32(b"hello hello hello"));
//! # Ok::<(), ziptree_codec::Error>(())
//! ```

mod error;
mod flate;
mod progress;

use std::sync::Arc;

pub use error::{Error, Result};
pub use flate::FlateCodec;

/// Progress callback: receives the processed fraction (0.0..=1.0) and a
/// flag that, once set, cancels the running operation.
pub type Progress<'a> = &'a mut dyn FnMut(f32, &mut bool);

/// A codec shared between an archive and every file node derived from it.
pub type SharedCodec = Arc<dyn Codec>;

/// Framing applied around the DEFLATE bit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowMode {
    /// Bare DEFLATE blocks, as stored inside ZIP members.
    Raw,
    /// A complete GZIP member: header, DEFLATE blocks, CRC-32 and size trailer.
    Gzip,
}

/// Result of a compression call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    /// The compressed bytes.
    pub data: Vec<u8>,
    /// CRC-32 of the uncompressed input.
    pub crc32: u32,
}

/// The compression collaborator consumed by the container crates.
pub trait Codec: Send + Sync {
    /// Compress `data` in one call, returning the bytes and the input's CRC-32.
    fn compress(
        &self,
        data: &[u8],
        mode: WindowMode,
        progress: Option<Progress<'_>>,
    ) -> Result<Compressed>;

    /// Decompress `data`, which must hold one complete stream.
    ///
    /// Bytes after the end of a raw stream are ignored.
    fn decompress(
        &self,
        data: &[u8],
        mode: WindowMode,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>>;

    /// Decompress `data`, failing with [`Error::LimitExceeded`] once the
    /// output grows past `limit` bytes.
    ///
    /// The default implementation checks after the fact; implementations
    /// that can stop early should override it.
    fn decompress_bounded(
        &self,
        data: &[u8],
        mode: WindowMode,
        limit: usize,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        let output = self.decompress(data, mode, progress)?;
        if output.len() > limit {
            return Err(Error::LimitExceeded { limit });
        }
        Ok(output)
    }
}

/// Compute the CRC-32 (IEEE) of a byte slice.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

/// Compress with the default codec.
pub fn compress(data: &[u8], mode: WindowMode) -> Result<Compressed> {
    FlateCodec::default().compress(data, mode, None)
}

/// Decompress with the default codec.
pub fn decompress(data: &[u8], mode: WindowMode) -> Result<Vec<u8>> {
    FlateCodec::default().decompress(data, mode, None)
}

/// The default codec behind an [`Arc`].
pub fn default_codec() -> SharedCodec {
    Arc::new(FlateCodec::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_free_functions_roundtrip() {
        let text = b"The quick brown fox jumped over the lazy dog.";
        for mode in [WindowMode::Raw, WindowMode::Gzip] {
            let packed = compress(text, mode).unwrap();
            assert_eq!(decompress(&packed.data, mode).unwrap(), text);
        }
    }
}
