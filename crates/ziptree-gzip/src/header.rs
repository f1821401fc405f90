//! GZIP member header.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ziptree_common::{text, BinaryReader, BinaryWriter};

use crate::{Error, Result};

/// GZIP magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// GZIP compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// Size of the fixed header.
pub const FIXED_HEADER_SIZE: usize = 10;

/// GZIP header flags.
pub mod flags {
    /// Text file.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits that must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// The operating system byte of a GZIP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingSystem {
    Fat,
    Amiga,
    Vms,
    Unix,
    VmCms,
    AtariTos,
    Hpfs,
    Macintosh,
    ZSystem,
    CpM,
    Tops20,
    Ntfs,
    Qdos,
    Acorn,
    /// Any other value, including 255 ("unknown").
    Unknown(u8),
}

impl OperatingSystem {
    /// The value written into headers created on this platform.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Ntfs
        } else if cfg!(unix) {
            Self::Unix
        } else {
            Self::Unknown(255)
        }
    }
}

impl From<u8> for OperatingSystem {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Fat,
            1 => Self::Amiga,
            2 => Self::Vms,
            3 => Self::Unix,
            4 => Self::VmCms,
            5 => Self::AtariTos,
            6 => Self::Hpfs,
            7 => Self::Macintosh,
            8 => Self::ZSystem,
            9 => Self::CpM,
            10 => Self::Tops20,
            11 => Self::Ntfs,
            12 => Self::Qdos,
            13 => Self::Acorn,
            other => Self::Unknown(other),
        }
    }
}

impl From<OperatingSystem> for u8 {
    fn from(os: OperatingSystem) -> Self {
        match os {
            OperatingSystem::Fat => 0,
            OperatingSystem::Amiga => 1,
            OperatingSystem::Vms => 2,
            OperatingSystem::Unix => 3,
            OperatingSystem::VmCms => 4,
            OperatingSystem::AtariTos => 5,
            OperatingSystem::Hpfs => 6,
            OperatingSystem::Macintosh => 7,
            OperatingSystem::ZSystem => 8,
            OperatingSystem::CpM => 9,
            OperatingSystem::Tops20 => 10,
            OperatingSystem::Ntfs => 11,
            OperatingSystem::Qdos => 12,
            OperatingSystem::Acorn => 13,
            OperatingSystem::Unknown(value) => value,
        }
    }
}

/// A GZIP member header.
///
/// Optional fields are kept as their stored bytes, so the length of a
/// parsed header is reproduced exactly by
/// [`offset_to_compressed_data`](Self::offset_to_compressed_data).
/// Name and comment are ISO 8859-1 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    is_text: bool,
    mtime: u32,
    extra_flags: u8,
    os: OperatingSystem,
    extra: Option<Vec<u8>>,
    name: Option<Vec<u8>>,
    comment: Option<Vec<u8>>,
    header_crc: bool,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            is_text: false,
            mtime: 0,
            extra_flags: 0,
            os: OperatingSystem::current(),
            extra: None,
            name: None,
            comment: None,
            header_crc: false,
        }
    }
}

impl GzipHeader {
    /// A header with no optional fields and no modification time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        reader.expect_magic(&GZIP_MAGIC)?;
        let method = reader.read_u8()?;
        if method != CM_DEFLATE {
            return Err(Error::InvalidMethod(method));
        }

        let flag_bits = reader.read_u8()?;
        if flag_bits & flags::RESERVED != 0 {
            return Err(Error::ReservedFlags(flag_bits));
        }

        let mtime = reader.read_u32()?;
        let extra_flags = reader.read_u8()?;
        let os = OperatingSystem::from(reader.read_u8()?);

        let extra = if flag_bits & flags::FEXTRA != 0 {
            let length = reader.read_u16()? as usize;
            Some(reader.read_bytes(length)?.to_vec())
        } else {
            None
        };

        let name = if flag_bits & flags::FNAME != 0 {
            Some(reader.read_cstring_bytes()?.to_vec())
        } else {
            None
        };

        let comment = if flag_bits & flags::FCOMMENT != 0 {
            Some(reader.read_cstring_bytes()?.to_vec())
        } else {
            None
        };

        let header_crc = flag_bits & flags::FHCRC != 0;
        if header_crc {
            let covered = &data[..reader.position()];
            let expected = reader.read_u16()?;
            let actual = header_crc16(covered);
            if expected != actual {
                return Err(Error::HeaderChecksum { expected, actual });
            }
        }

        Ok(Self {
            is_text: flag_bits & flags::FTEXT != 0,
            mtime,
            extra_flags,
            os,
            extra,
            name,
            comment,
            header_crc,
        })
    }

    /// The flag byte implied by the fields present.
    pub fn flags(&self) -> u8 {
        let mut bits = 0;
        if self.is_text {
            bits |= flags::FTEXT;
        }
        if self.header_crc {
            bits |= flags::FHCRC;
        }
        if self.extra.is_some() {
            bits |= flags::FEXTRA;
        }
        if self.name.is_some() {
            bits |= flags::FNAME;
        }
        if self.comment.is_some() {
            bits |= flags::FCOMMENT;
        }
        bits
    }

    /// Length of the header: where the DEFLATE payload starts.
    ///
    /// The fixed 10 bytes plus, in order, the extra field (with its 2-byte
    /// length), the NUL-terminated name, the NUL-terminated comment and the
    /// 2-byte header CRC, each only when present.
    pub fn offset_to_compressed_data(&self) -> usize {
        FIXED_HEADER_SIZE
            + self.extra.as_ref().map_or(0, |extra| 2 + extra.len())
            + self.name.as_ref().map_or(0, |name| name.len() + 1)
            + self.comment.as_ref().map_or(0, |comment| comment.len() + 1)
            + if self.header_crc { 2 } else { 0 }
    }

    /// Serialize the header.
    ///
    /// A header CRC, when requested, is recomputed over the bytes written.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::new(Vec::with_capacity(self.offset_to_compressed_data()));

        writer.write_bytes(&GZIP_MAGIC)?;
        writer.write_u8(CM_DEFLATE)?;
        writer.write_u8(self.flags())?;
        writer.write_u32(self.mtime)?;
        writer.write_u8(self.extra_flags)?;
        writer.write_u8(self.os.into())?;

        if let Some(extra) = &self.extra {
            writer.write_u16(extra.len() as u16)?;
            writer.write_bytes(extra)?;
        }
        if let Some(name) = &self.name {
            writer.write_bytes(name)?;
            writer.write_u8(0)?;
        }
        if let Some(comment) = &self.comment {
            writer.write_bytes(comment)?;
            writer.write_u8(0)?;
        }
        if self.header_crc {
            let crc = header_crc16(writer.get_ref());
            writer.write_u16(crc)?;
        }

        Ok(writer.into_inner())
    }

    /// Original file name, decoded from ISO 8859-1.
    pub fn name(&self) -> Option<String> {
        self.name.as_deref().map(text::decode_latin1)
    }

    /// Stored name bytes.
    pub fn name_bytes(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// Set or clear the original file name.
    ///
    /// Fails if the name has no ISO 8859-1 form or contains NUL.
    pub fn set_name(&mut self, name: Option<&str>) -> Result<()> {
        self.name = name.map(encode_field).transpose()?;
        Ok(())
    }

    pub fn comment(&self) -> Option<String> {
        self.comment.as_deref().map(text::decode_latin1)
    }

    pub fn set_comment(&mut self, comment: Option<&str>) -> Result<()> {
        self.comment = comment.map(encode_field).transpose()?;
        Ok(())
    }

    /// Raw extra field.
    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }

    /// Set or clear the extra field. At most 65535 bytes are kept.
    pub fn set_extra(&mut self, extra: Option<Vec<u8>>) {
        self.extra = extra.map(|mut bytes| {
            bytes.truncate(u16::MAX as usize);
            bytes
        });
    }

    /// Modification time as stored; zero means absent.
    #[inline]
    pub fn mtime(&self) -> u32 {
        self.mtime
    }

    /// Modification time, or `None` when the header carries none.
    pub fn modified(&self) -> Option<SystemTime> {
        match self.mtime {
            0 => None,
            secs => UNIX_EPOCH.checked_add(Duration::from_secs(u64::from(secs))),
        }
    }

    /// Set the modification time, rounded to whole seconds.
    ///
    /// Times before the epoch or past 2106 are stored as absent.
    pub fn set_modified(&mut self, time: Option<SystemTime>) {
        self.mtime = time
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|since| since.as_secs_f64().round() as u64)
            .and_then(|secs| u32::try_from(secs).ok())
            .unwrap_or(0);
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.is_text
    }

    pub fn set_text(&mut self, is_text: bool) {
        self.is_text = is_text;
    }

    #[inline]
    pub fn extra_flags(&self) -> u8 {
        self.extra_flags
    }

    #[inline]
    pub fn os(&self) -> OperatingSystem {
        self.os
    }

    pub fn set_os(&mut self, os: OperatingSystem) {
        self.os = os;
    }

    /// Whether the serialized header carries a CRC.
    #[inline]
    pub fn has_header_crc(&self) -> bool {
        self.header_crc
    }

    /// The header CRC as [`to_bytes`](Self::to_bytes) writes it, when enabled.
    pub fn header_crc(&self) -> Result<Option<u16>> {
        if !self.header_crc {
            return Ok(None);
        }
        let bytes = self.to_bytes()?;
        let covered = &bytes[..bytes.len() - 2];
        Ok(Some(header_crc16(covered)))
    }

    /// Request or drop a header CRC on serialization.
    pub fn set_header_crc(&mut self, enabled: bool) {
        self.header_crc = enabled;
    }
}

fn encode_field(value: &str) -> Result<Vec<u8>> {
    if value.contains('\0') {
        return Err(ziptree_common::Error::Unencodable(value.to_string()).into());
    }
    Ok(text::encode_latin1(value)?)
}

/// Header CRC: the low 16 bits of the CRC-32 of the preceding header bytes.
fn header_crc16(bytes: &[u8]) -> u16 {
    (ziptree_codec::crc32(bytes) & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ziptree_common::ErrorKind;

    /// A header with every optional field, assembled by hand.
    fn full_header() -> Vec<u8> {
        let mut data = vec![0x1F, 0x8B, 8, 0x1F, 0x78, 0x56, 0x34, 0x12, 2, 3];
        data.extend_from_slice(&[3, 0, b'x', b'y', b'z']);
        data.extend_from_slice(b"caf\xe9.txt\0");
        data.extend_from_slice(b"note\0");
        let crc = header_crc16(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_all_fields() {
        let data = full_header();
        let header = GzipHeader::parse(&data).unwrap();

        assert!(header.is_text());
        assert_eq!(header.mtime(), 0x12345678);
        assert_eq!(header.extra_flags(), 2);
        assert_eq!(header.os(), OperatingSystem::Unix);
        assert_eq!(header.extra(), Some(&b"xyz"[..]));
        assert_eq!(header.name().as_deref(), Some("caf\u{e9}.txt"));
        assert_eq!(header.comment().as_deref(), Some("note"));
        assert!(header.has_header_crc());
        let stored = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);
        assert_eq!(header.header_crc().unwrap(), Some(stored));
        assert_eq!(header.offset_to_compressed_data(), data.len());
        assert_eq!(header.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_minimal_header() {
        let data = [0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF];
        let header = GzipHeader::parse(&data).unwrap();

        assert_eq!(header.offset_to_compressed_data(), 10);
        assert_eq!(header.modified(), None);
        assert_eq!(header.os(), OperatingSystem::Unknown(255));
        assert_eq!(header.name(), None);
    }

    #[rstest]
    #[case::bad_magic(&[0x1F, 0x8C, 8, 0, 0, 0, 0, 0, 0, 3])]
    #[case::bad_method(&[0x1F, 0x8B, 7, 0, 0, 0, 0, 0, 0, 3])]
    #[case::reserved_flags(&[0x1F, 0x8B, 8, 0x20, 0, 0, 0, 0, 0, 3])]
    #[case::truncated(&[0x1F, 0x8B, 8, 0])]
    #[case::unterminated_name(&[0x1F, 0x8B, 8, 0x08, 0, 0, 0, 0, 0, 3, b'a'])]
    fn test_invalid_headers(#[case] data: &[u8]) {
        let err = GzipHeader::parse(data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_header_crc_mismatch() {
        let mut data = full_header();
        let len = data.len();
        data[len - 1] ^= 0xFF;
        assert!(matches!(
            GzipHeader::parse(&data),
            Err(Error::HeaderChecksum { .. })
        ));
    }

    #[test]
    fn test_set_name() {
        let mut header = GzipHeader::new();
        header.set_name(Some("data.bin")).unwrap();
        assert_eq!(header.flags(), flags::FNAME);
        assert_eq!(header.offset_to_compressed_data(), 10 + 9);

        assert!(header.set_name(Some("a\0b")).is_err());
        assert!(header.set_name(Some("\u{65e5}")).is_err());

        header.set_name(None).unwrap();
        assert_eq!(header.flags(), 0);
    }

    #[test]
    fn test_modified_rounds() {
        let mut header = GzipHeader::new();
        header.set_modified(Some(UNIX_EPOCH + Duration::from_millis(1_500_700)));
        assert_eq!(header.mtime(), 1501);

        header.set_modified(None);
        assert_eq!(header.modified(), None);
    }

    #[test]
    fn test_os_values() {
        for value in 0..=255u8 {
            assert_eq!(u8::from(OperatingSystem::from(value)), value);
        }
        assert_eq!(OperatingSystem::from(13), OperatingSystem::Acorn);
    }

    #[test]
    fn test_enabled_header_crc_matches_serialized() {
        let mut header = GzipHeader::new();
        header.set_name(Some("data.bin")).unwrap();
        assert_eq!(header.header_crc().unwrap(), None);

        header.set_header_crc(true);
        let bytes = header.to_bytes().unwrap();
        let crc = header.header_crc().unwrap().unwrap();
        assert_eq!(crc, header_crc16(&bytes[..bytes.len() - 2]));
        assert_eq!(&bytes[bytes.len() - 2..], &crc.to_le_bytes()[..]);

        let parsed = GzipHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.header_crc().unwrap(), Some(crc));
    }

    #[test]
    fn test_name_is_latin1() {
        let mut data = vec![0x1F, 0x8B, 8, flags::FNAME, 0, 0, 0, 0, 0, 3];
        data.extend_from_slice(b"\x80\x9f\xe9\0");
        let header = GzipHeader::parse(&data).unwrap();
        assert_eq!(header.name().as_deref(), Some("\u{80}\u{9f}\u{e9}"));

        let mut renamed = GzipHeader::new();
        renamed.set_name(header.name().as_deref()).unwrap();
        assert_eq!(renamed.name_bytes(), Some(&b"\x80\x9f\xe9"[..]));
    }
}
