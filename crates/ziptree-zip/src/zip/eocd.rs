//! End of Central Directory (EOCD) record and its locator.

use std::io::Write;

use log::trace;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use ziptree_common::{BinaryReader, BinaryWriter};

use crate::{Error, Result};

/// End of Central Directory Record (without signature).
///
/// The 4-byte signature (0x06054b50) is read separately before this struct.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EocdRecord {
    /// Number of this disk
    pub disk_number: u16,
    /// Disk where central directory starts
    pub central_dir_disk: u16,
    /// Number of central directory records on this disk
    pub central_dir_count_disk: u16,
    /// Total number of central directory records
    pub central_dir_count_total: u16,
    /// Size of central directory (bytes)
    pub central_dir_size: u32,
    /// Offset of start of central directory
    pub central_dir_offset: u32,
    /// Comment length
    pub comment_length: u16,
}

impl EocdRecord {
    /// EOCD signature bytes.
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    /// EOCD signature as u32.
    pub const SIGNATURE: u32 = 0x06054b50;

    /// Size of the record including its signature and excluding the comment.
    pub const SIZE: usize = 4 + std::mem::size_of::<Self>();

    /// Longest comment the 16-bit length field can describe.
    pub const MAX_COMMENT: usize = u16::MAX as usize;

    /// Check whether any field holds a ZIP64 sentinel.
    pub fn is_zip64(&self) -> bool {
        self.central_dir_count_total == 0xFFFF
            || self.central_dir_offset == 0xFFFFFFFF
            || self.central_dir_size == 0xFFFFFFFF
    }
}

/// The decoded EOCD summary of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Absolute offset of the EOCD signature.
    pub offset: usize,
    /// Number of central directory entries.
    pub entry_count: u16,
    /// Size of the central directory in bytes.
    pub central_dir_size: u32,
    /// Absolute offset of the first central directory entry.
    pub central_dir_offset: u32,
    /// Raw archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Find the EOCD signature.
    ///
    /// Candidates are scanned backward from `len - 22`, accepting the first
    /// one whose comment length field accounts exactly for the bytes that
    /// follow the fixed record. At most 65535 bytes of comment are
    /// considered, so a signature-like pattern inside the comment itself
    /// cannot be picked unless its length also lines up.
    pub fn locate(data: &[u8]) -> Result<usize> {
        let len = data.len();
        if len < EocdRecord::SIZE {
            return Err(Error::EocdNotFound);
        }

        let last = len - EocdRecord::SIZE;
        let first = last.saturating_sub(EocdRecord::MAX_COMMENT);

        for candidate in (first..=last).rev() {
            let reader = BinaryReader::new_at(data, candidate);
            if reader.peek_u32()? != EocdRecord::SIGNATURE {
                continue;
            }

            let comment_length = BinaryReader::new_at(data, candidate + 20).peek_u16()?;
            if comment_length as usize == len - candidate - EocdRecord::SIZE {
                trace!("EOCD at offset {candidate} with {comment_length} comment bytes");
                return Ok(candidate);
            }
        }

        Err(Error::EocdNotFound)
    }

    /// Locate and decode the EOCD record of an archive.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let offset = Self::locate(data)?;
        let mut reader = BinaryReader::new_at(data, offset);
        reader.advance(4); // Skip signature
        let record: EocdRecord = reader.read_struct()?;

        let disk_number = record.disk_number;
        let central_dir_disk = record.central_dir_disk;
        let count_disk = record.central_dir_count_disk;
        let count_total = record.central_dir_count_total;
        if disk_number != 0 || central_dir_disk != 0 || count_disk != count_total {
            return Err(Error::MultiDisk {
                disk: disk_number,
                central_dir_disk,
            });
        }
        if record.is_zip64() {
            return Err(Error::Zip64);
        }

        let comment = reader.read_bytes(record.comment_length as usize)?.to_vec();

        Ok(Self {
            offset,
            entry_count: count_total,
            central_dir_size: record.central_dir_size,
            central_dir_offset: record.central_dir_offset,
            comment,
        })
    }

    /// Emit the record (signature, fixed fields and comment).
    pub fn write<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        let comment_length =
            u16::try_from(self.comment.len()).map_err(|_| Error::CommentTooLong(self.comment.len()))?;

        let record = EocdRecord {
            disk_number: 0,
            central_dir_disk: 0,
            central_dir_count_disk: self.entry_count,
            central_dir_count_total: self.entry_count,
            central_dir_size: self.central_dir_size,
            central_dir_offset: self.central_dir_offset,
            comment_length,
        };

        writer.write_u32(EocdRecord::SIGNATURE)?;
        writer.write_struct(&record)?;
        writer.write_bytes(&self.comment)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ziptree_common::ErrorKind;

    fn empty_archive(comment: &[u8]) -> Vec<u8> {
        let eocd = EndOfCentralDirectory {
            offset: 0,
            entry_count: 0,
            central_dir_size: 0,
            central_dir_offset: 0,
            comment: comment.to_vec(),
        };
        let mut writer = BinaryWriter::new(Vec::new());
        eocd.write(&mut writer).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_record_size() {
        assert_eq!(EocdRecord::SIZE, 22);
        assert_eq!(empty_archive(b"").len(), 22);
    }

    #[test]
    fn test_locate_skips_signature_inside_comment() {
        // A comment that itself contains the EOCD signature
        let mut comment = EocdRecord::MAGIC.to_vec();
        comment.extend_from_slice(&[0u8; 30]);
        let data = empty_archive(&comment);

        assert_eq!(EndOfCentralDirectory::locate(&data).unwrap(), 0);
        let eocd = EndOfCentralDirectory::parse(&data).unwrap();
        assert_eq!(eocd.comment, comment);
    }

    #[test]
    fn test_locate_rejects_short_input() {
        let err = EndOfCentralDirectory::locate(&[0x50, 0x4b, 0x05, 0x06]).unwrap_err();
        assert!(matches!(err, Error::EocdNotFound));
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_multi_disk_is_unsupported() {
        let mut data = empty_archive(b"");
        data[4] = 1; // disk number
        let err = EndOfCentralDirectory::parse(&data).unwrap_err();
        assert!(matches!(err, Error::MultiDisk { disk: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_zip64_sentinel_is_unsupported() {
        let mut data = empty_archive(b"");
        data[16..20].copy_from_slice(&[0xFF; 4]); // central directory offset
        let err = EndOfCentralDirectory::parse(&data).unwrap_err();
        assert!(matches!(err, Error::Zip64));
    }
}
