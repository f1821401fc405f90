//! Binary writer for little-endian record encoding.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use zerocopy::{Immutable, IntoBytes};

use crate::Result;

/// A little-endian writer that tracks how many bytes it has emitted.
///
/// The running [`position`](Self::position) is what container writers use
/// as the offset of the next record, so it counts every byte passed to the
/// sink regardless of where the sink itself started.
///
/// # Example
///
/// ```
/// use ziptree_common::BinaryWriter;
///
/// let mut writer = BinaryWriter::new(Vec::new());
/// writer.write_u32(0x06054b50).unwrap();
/// writer.write_u16(0).unwrap();
/// assert_eq!(writer.position(), 6);
/// assert_eq!(writer.into_inner(), [0x50, 0x4b, 0x05, 0x06, 0x00, 0x00]);
/// ```
#[derive(Debug)]
pub struct BinaryWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> BinaryWriter<W> {
    /// Create a new writer around a sink.
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        self.position += 1;
        Ok(())
    }

    /// Write a little-endian u16.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(value)?;
        self.position += 2;
        Ok(())
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    /// Write a run of raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Write a struct using zerocopy.
    ///
    /// The struct's in-memory layout must match the on-disk layout, which
    /// for the little-endian targets we support means `#[repr(C, packed)]`.
    pub fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Get a reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_primitives() {
        let mut writer = BinaryWriter::new(Vec::new());
        writer.write_u8(0x7F).unwrap();
        writer.write_u16(0xFEFF).unwrap();
        writer.write_u32(0x04030201).unwrap();
        writer.write_bytes(b"ab").unwrap();

        assert_eq!(writer.position(), 9);
        assert_eq!(
            writer.into_inner(),
            [0x7F, 0xFF, 0xFE, 0x01, 0x02, 0x03, 0x04, b'a', b'b']
        );
    }

    #[test]
    fn test_reader_reads_back_writer_output() {
        let mut writer = BinaryWriter::new(Vec::new());
        writer.write_u32(0x02014b50).unwrap();
        writer.write_u16(20).unwrap();
        let bytes = writer.into_inner();

        let mut reader = crate::BinaryReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 0x02014b50);
        assert_eq!(reader.read_u16().unwrap(), 20);
    }

    #[test]
    fn test_sink_errors_surface() {
        let mut sink = [0u8; 2];
        let mut writer = BinaryWriter::new(&mut sink[..]);
        assert!(writer.write_u32(1).is_err());
    }
}
