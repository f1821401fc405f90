//! Decoded central directory and local file header records.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ziptree_common::{text, BinaryReader};

use crate::zip::{CentralDirectoryHeader, CompressionMethod, GeneralPurposeFlags, LocalFileHeader};
use crate::{Error, Result};

/// An MS-DOS packed timestamp, as stored in ZIP headers.
///
/// - Time: bits 0-4 = seconds/2, bits 5-10 = minutes, bits 11-15 = hours
/// - Date: bits 0-4 = day, bits 5-8 = month, bits 9-15 = year-1980
///
/// The all-zero value is not a valid date and converts to `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    /// Packed time field.
    pub time: u16,
    /// Packed date field.
    pub date: u16,
}

impl DosDateTime {
    /// Wrap raw packed fields.
    pub const fn new(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    /// Pack calendar parts. Seconds are rounded down to an even number.
    ///
    /// Returns `None` outside 1980..=2107 or for out-of-range parts.
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }

        let time = (u16::from(hour) << 11) | (u16::from(minute) << 5) | u16::from(second / 2);
        let date = ((year - 1980) << 9) | (u16::from(month) << 5) | u16::from(day);
        Some(Self { time, date })
    }

    /// Pack a `SystemTime`, interpreted as UTC.
    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);

        Self::from_parts(
            u16::try_from(year).ok()?,
            month,
            day,
            (rem / 3600) as u8,
            ((rem % 3600) / 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// Convert to a `SystemTime`, interpreting the fields as UTC.
    pub fn to_system_time(self) -> Option<SystemTime> {
        let year = 1980 + i64::from(self.date >> 9);
        let month = u32::from((self.date >> 5) & 0x0F);
        let day = i64::from(self.date & 0x1F);
        let hour = u64::from(self.time >> 11);
        let minute = u64::from((self.time >> 5) & 0x3F);
        let second = u64::from(self.time & 0x1F) * 2;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 59 {
            return None;
        }

        let mut days = 0i64;
        for y in 1970..year {
            days += if is_leap_year(y) { 366 } else { 365 };
        }

        const DAYS_IN_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
        for m in 1..month {
            days += DAYS_IN_MONTH[(m - 1) as usize];
            if m == 2 && is_leap_year(year) {
                days += 1;
            }
        }
        days += day - 1;

        let secs = days as u64 * 86_400 + hour * 3600 + minute * 60 + second;
        UNIX_EPOCH.checked_add(Duration::from_secs(secs))
    }
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// One decoded central directory record.
///
/// This is the archive's authoritative description of a member. The
/// member's bytes are reached through [`ArchiveIndex`](crate::ArchiveIndex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    offset: usize,
    version_made_by: u16,
    version_needed: u16,
    flags: GeneralPurposeFlags,
    compression_method: CompressionMethod,
    modified: DosDateTime,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
    external_attrs: u32,
    name: String,
    name_length: u16,
    extra_length: u16,
    comment: Vec<u8>,
}

impl CentralDirectoryEntry {
    /// Decode the record starting at `offset`.
    ///
    /// Names without the UTF-8 flag are decoded as Windows-1252.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        let mut reader = BinaryReader::new_at(data, offset);

        let sig = reader.read_u32()?;
        if sig != CentralDirectoryHeader::SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: CentralDirectoryHeader::SIGNATURE,
                actual: sig,
            });
        }

        let header: CentralDirectoryHeader = reader.read_struct()?;
        let flags = GeneralPurposeFlags::from_bits(header.flags);
        let compression_method =
            CompressionMethod::try_from(header.compression_method).map_err(Error::UnknownCompression)?;

        let name_bytes = reader.read_bytes(header.file_name_length as usize)?;
        let name = text::decode_name(name_bytes, flags.contains(GeneralPurposeFlags::UTF8))?;
        reader.advance(header.extra_field_length as usize);
        let comment = reader.read_bytes(header.file_comment_length as usize)?.to_vec();

        Ok(Self {
            offset,
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            flags,
            compression_method,
            modified: DosDateTime::new(header.last_modified_time, header.last_modified_date),
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            local_header_offset: header.local_header_offset,
            external_attrs: header.external_attrs,
            name,
            name_length: header.file_name_length,
            extra_length: header.extra_field_length,
            comment,
        })
    }

    /// Total length of the record: fixed part, name, extra field and comment.
    #[inline]
    pub fn record_len(&self) -> usize {
        CentralDirectoryHeader::SIZE
            + self.name_length as usize
            + self.extra_length as usize
            + self.comment.len()
    }

    /// Absolute offset of this record within the archive.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Get the file name/path.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Path components of the name, skipping empty ones.
    pub fn components(&self) -> impl Iterator<Item = &str> + '_ {
        self.name.split('/').filter(|part| !part.is_empty())
    }

    #[inline]
    pub fn version_made_by(&self) -> u16 {
        self.version_made_by
    }

    #[inline]
    pub fn version_needed(&self) -> u16 {
        self.version_needed
    }

    #[inline]
    pub fn flags(&self) -> GeneralPurposeFlags {
        self.flags
    }

    #[inline]
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    #[inline]
    pub fn modified(&self) -> DosDateTime {
        self.modified
    }

    /// Get the last modification time, or `None` if the stored date is invalid.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.modified.to_system_time()
    }

    /// Get the CRC-32 of the uncompressed data.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    #[inline]
    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    #[inline]
    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Offset of the matching local file header.
    #[inline]
    pub fn local_header_offset(&self) -> u32 {
        self.local_header_offset
    }

    #[inline]
    pub fn external_attrs(&self) -> u32 {
        self.external_attrs
    }

    /// Raw per-entry comment.
    #[inline]
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }
}

/// The local header in front of a member's data.
///
/// Only the fields needed to find and size the data are kept; the central
/// directory record stays authoritative for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEntry {
    offset: usize,
    flags: GeneralPurposeFlags,
    compression_method: CompressionMethod,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    variable_length: usize,
}

impl LocalEntry {
    /// Decode the local header starting at `offset`.
    pub fn decode(data: &[u8], offset: usize) -> Result<Self> {
        let mut reader = BinaryReader::new_at(data, offset);

        let sig = reader.read_u32()?;
        if sig != LocalFileHeader::SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: LocalFileHeader::SIGNATURE,
                actual: sig,
            });
        }

        let header: LocalFileHeader = reader.read_struct()?;
        let compression_method =
            CompressionMethod::try_from(header.compression_method).map_err(Error::UnknownCompression)?;

        Ok(Self {
            offset,
            flags: GeneralPurposeFlags::from_bits(header.flags),
            compression_method,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            variable_length: header.variable_data_size(),
        })
    }

    /// Absolute offset of the first data byte.
    #[inline]
    pub fn data_offset(&self) -> usize {
        self.offset + LocalFileHeader::SIZE + self.variable_length
    }

    #[inline]
    pub fn flags(&self) -> GeneralPurposeFlags {
        self.flags
    }

    #[inline]
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Compressed size as written in the local header.
    ///
    /// Zero when the sizes were deferred to a data descriptor.
    #[inline]
    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    #[inline]
    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Whether sizes and CRC follow the data in a descriptor.
    #[inline]
    pub fn has_data_descriptor(&self) -> bool {
        self.flags.contains(GeneralPurposeFlags::DATA_DESCRIPTOR)
    }
}
