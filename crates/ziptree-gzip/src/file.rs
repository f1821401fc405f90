//! A single file wrapped in a GZIP envelope.

use std::time::SystemTime;

use log::debug;
use ziptree_codec::{Codec, Progress, WindowMode};

use crate::header::GzipHeader;
use crate::Result;

/// A GZIP member held in memory: its header and its uncompressed contents.
///
/// # Example
///
/// ```
/// use ziptree_gzip::GzipFile;
///
/// let file = GzipFile::new(Some("notes.txt"), b"some notes".to_vec())?;
/// let bytes = file.encode()?;
///
/// let decoded = GzipFile::decode(&bytes)?;
/// assert_eq!(decoded.name().as_deref(), Some("notes.txt"));
/// assert_eq!(decoded.contents(), b"some notes");
/// # Ok::<(), ziptree_gzip::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipFile {
    header: GzipHeader,
    contents: Vec<u8>,
}

impl GzipFile {
    /// Wrap contents, optionally under an original file name.
    pub fn new(name: Option<&str>, contents: Vec<u8>) -> Result<Self> {
        let mut header = GzipHeader::new();
        header.set_name(name)?;
        Ok(Self { header, contents })
    }

    /// Decode a GZIP member with the default codec.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with(data, &ziptree_codec::FlateCodec::default(), None)
    }

    /// Decode a GZIP member.
    ///
    /// The payload after the header is inflated as raw DEFLATE. The CRC-32
    /// and size trailer, and anything after it, are not inspected.
    pub fn decode_with(
        data: &[u8],
        codec: &dyn Codec,
        progress: Option<Progress<'_>>,
    ) -> Result<Self> {
        let header = GzipHeader::parse(data)?;
        let offset = header.offset_to_compressed_data();
        let contents = codec.decompress(&data[offset..], WindowMode::Raw, progress)?;

        debug!(
            "Decoded GZIP member {:?}: {} -> {} bytes",
            header.name(),
            data.len(),
            contents.len()
        );
        Ok(Self { header, contents })
    }

    /// Encode with the default codec.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with(&ziptree_codec::FlateCodec::default(), None)
    }

    /// Encode as a complete GZIP member.
    ///
    /// The header is written with the file name (if any) and the current
    /// time, followed by the raw DEFLATE payload and the CRC-32/size trailer.
    pub fn encode_with(&self, codec: &dyn Codec, progress: Option<Progress<'_>>) -> Result<Vec<u8>> {
        let mut header = self.header.clone();
        header.set_modified(Some(SystemTime::now()));

        let compressed = codec.compress(&self.contents, WindowMode::Raw, progress)?;

        let mut out = header.to_bytes()?;
        out.reserve(compressed.data.len() + 8);
        out.extend_from_slice(&compressed.data);
        out.extend_from_slice(&compressed.crc32.to_le_bytes());
        // ISIZE is the length modulo 2^32
        out.extend_from_slice(&(self.contents.len() as u32).to_le_bytes());

        debug!(
            "Encoded GZIP member {:?}: {} -> {} bytes",
            header.name(),
            self.contents.len(),
            out.len()
        );
        Ok(out)
    }

    #[inline]
    pub fn header(&self) -> &GzipHeader {
        &self.header
    }

    #[inline]
    pub fn header_mut(&mut self) -> &mut GzipHeader {
        &mut self.header
    }

    /// Original file name from the header.
    pub fn name(&self) -> Option<String> {
        self.header.name()
    }

    /// Rename the wrapped file. `None` removes the name.
    pub fn set_name(&mut self, name: Option<&str>) -> Result<()> {
        self.header.set_name(name)
    }

    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn set_contents(&mut self, contents: Vec<u8>) {
        self.contents = contents;
    }

    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::UNIX_EPOCH;
    use ziptree_common::ErrorKind;

    #[test]
    fn test_roundtrip() {
        let text = b"Hello, GZIP! Hello, GZIP! Hello, GZIP!".to_vec();
        let file = GzipFile::new(Some("hello.txt"), text.clone()).unwrap();

        let decoded = GzipFile::decode(&file.encode().unwrap()).unwrap();
        assert_eq!(decoded.contents(), text.as_slice());
        assert_eq!(decoded.name().as_deref(), Some("hello.txt"));
        assert!(decoded.header().modified().unwrap() > UNIX_EPOCH);
    }

    #[test]
    fn test_nameless() {
        let file = GzipFile::new(None, b"anonymous".to_vec()).unwrap();
        let bytes = file.encode().unwrap();
        assert_eq!(bytes[3], 0);

        let decoded = GzipFile::decode(&bytes).unwrap();
        assert_eq!(decoded.name(), None);
        assert_eq!(decoded.contents(), b"anonymous");
    }

    #[test]
    fn test_rename_and_reencode() {
        let original = GzipFile::new(Some("a.txt"), b"abc".to_vec()).unwrap();
        let mut file = GzipFile::decode(&original.encode().unwrap()).unwrap();
        file.set_name(Some("b.txt")).unwrap();

        let decoded = GzipFile::decode(&file.encode().unwrap()).unwrap();
        assert_eq!(decoded.name().as_deref(), Some("b.txt"));
        assert_eq!(decoded.contents(), b"abc");
    }

    #[test]
    fn test_reads_flate2_output() {
        let mut encoder = flate2::GzBuilder::new()
            .filename("other.txt")
            .comment("made elsewhere")
            .extra(vec![1, 2, 3, 4])
            .write(Vec::new(), flate2::Compression::best());
        encoder.write_all(b"interop interop interop").unwrap();
        let bytes = encoder.finish().unwrap();

        let file = GzipFile::decode(&bytes).unwrap();
        assert_eq!(file.name().as_deref(), Some("other.txt"));
        assert_eq!(file.header().comment().as_deref(), Some("made elsewhere"));
        assert_eq!(file.header().extra(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(file.contents(), b"interop interop interop");
    }

    #[test]
    fn test_flate2_reads_output() {
        let data = vec![42u8; 100_000];
        let bytes = GzipFile::new(Some("big.bin"), data.clone())
            .unwrap()
            .encode()
            .unwrap();

        let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(
            decoder.header().and_then(|h| h.filename()),
            Some(&b"big.bin"[..])
        );
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = GzipFile::new(None, b"truncate me please".to_vec())
            .unwrap()
            .encode()
            .unwrap();
        // Keep the header and two bytes of payload
        let err = GzipFile::decode(&bytes[..12]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_decode_cancel() {
        let bytes = GzipFile::new(None, vec![0u8; 50_000]).unwrap().encode().unwrap();
        let mut cancel = |_: f32, stop: &mut bool| *stop = true;
        let err = GzipFile::decode_with(
            &bytes,
            &ziptree_codec::FlateCodec::default(),
            Some(&mut cancel),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Canceled);
    }
}
