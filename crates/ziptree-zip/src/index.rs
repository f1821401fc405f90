//! In-memory ZIP archive index.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, trace};
use ziptree_codec::{Progress, SharedCodec, WindowMode};

use crate::entry::{CentralDirectoryEntry, LocalEntry};
use crate::zip::{CompressionMethod, EndOfCentralDirectory};
use crate::{Error, Result};

/// A parsed archive: the raw bytes, the EOCD summary and every central
/// directory entry in on-disk order.
///
/// The index owns the archive bytes and is shared (`Arc`) by every file
/// node built from it, so it lives as long as any node still needs to
/// inflate data.
pub struct ArchiveIndex {
    data: Arc<[u8]>,
    eocd: EndOfCentralDirectory,
    entries: Vec<CentralDirectoryEntry>,
    codec: SharedCodec,
}

impl ArchiveIndex {
    /// Parse an archive held in memory, using the default codec.
    pub fn open(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::open_with_codec(data, ziptree_codec::default_codec())
    }

    /// Parse an archive held in memory.
    ///
    /// The codec is used later, when entries are inflated.
    pub fn open_with_codec(data: impl Into<Arc<[u8]>>, codec: SharedCodec) -> Result<Self> {
        let data = data.into();
        let eocd = EndOfCentralDirectory::parse(&data)?;

        let start = eocd.central_dir_offset as usize;
        let end = start as u64 + u64::from(eocd.central_dir_size);
        debug!(
            "Central directory at {start} ({} bytes, {} entries), EOCD at {}",
            eocd.central_dir_size, eocd.entry_count, eocd.offset
        );

        let mut entries = Vec::with_capacity(eocd.entry_count as usize);
        let mut cursor = start;
        for _ in 0..eocd.entry_count {
            let entry = CentralDirectoryEntry::decode(&data, cursor)?;
            trace!("Entry {:?} at {cursor}", entry.name());
            cursor += entry.record_len();
            entries.push(entry);
        }

        if cursor as u64 != end || end > eocd.offset as u64 {
            return Err(Error::CentralDirectoryMismatch {
                expected: end,
                actual: cursor as u64,
            });
        }

        Ok(Self {
            data,
            eocd,
            entries,
            codec,
        })
    }

    /// The raw archive bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The decoded end of central directory record.
    #[inline]
    pub fn eocd(&self) -> &EndOfCentralDirectory {
        &self.eocd
    }

    /// The archive comment.
    #[inline]
    pub fn comment(&self) -> &[u8] {
        &self.eocd.comment
    }

    /// All central directory entries, in on-disk order.
    #[inline]
    pub fn entries(&self) -> &[CentralDirectoryEntry] {
        &self.entries
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Find an entry by its exact stored name.
    pub fn find(&self, name: &str) -> Option<&CentralDirectoryEntry> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    /// The codec used to inflate entries.
    #[inline]
    pub fn codec(&self) -> &SharedCodec {
        &self.codec
    }

    /// Decode the local header of an entry.
    pub fn local_header(&self, entry: &CentralDirectoryEntry) -> Result<LocalEntry> {
        LocalEntry::decode(&self.data, entry.local_header_offset() as usize)
    }

    /// Locate the compressed bytes of an entry.
    ///
    /// The size comes from the local header unless that header defers it
    /// to a data descriptor, in which case the central record's size is used.
    pub fn compressed_range(&self, entry: &CentralDirectoryEntry) -> Result<Range<usize>> {
        if entry.flags().is_encrypted() {
            return Err(Error::Encrypted(entry.name().to_string()));
        }

        let local = self.local_header(entry)?;
        let size = if local.has_data_descriptor() {
            entry.compressed_size()
        } else {
            local.compressed_size()
        };

        let start = local.data_offset();
        let end = start as u64 + u64::from(size);
        if end > self.data.len() as u64 {
            return Err(Error::EntryOutOfBounds {
                name: entry.name().to_string(),
                start: start as u64,
                end,
                len: self.data.len(),
            });
        }

        Ok(start..end as usize)
    }

    /// Extract an entry's uncompressed bytes.
    pub fn inflate(&self, entry: &CentralDirectoryEntry) -> Result<Vec<u8>> {
        self.inflate_with_progress(entry, None)
    }

    /// Extract an entry's uncompressed bytes, reporting progress.
    ///
    /// The result is checked against the central record's size and CRC-32.
    /// Inflation stops as soon as the output grows past the recorded size.
    pub fn inflate_with_progress(
        &self,
        entry: &CentralDirectoryEntry,
        progress: Option<Progress<'_>>,
    ) -> Result<Vec<u8>> {
        let range = self.compressed_range(entry)?;
        let raw = &self.data[range];

        let data = match entry.compression_method() {
            CompressionMethod::Stored => {
                if let Some(callback) = progress {
                    let mut cancel = false;
                    callback(1.0, &mut cancel);
                    if cancel {
                        return Err(ziptree_codec::Error::Canceled.into());
                    }
                }
                raw.to_vec()
            }
            CompressionMethod::Deflated => {
                let limit = entry.uncompressed_size() as usize;
                self.codec
                    .decompress_bounded(raw, WindowMode::Raw, limit, progress)
                    .map_err(|err| match err {
                        ziptree_codec::Error::LimitExceeded { .. } => Error::SizeExceeded {
                            name: entry.name().to_string(),
                            expected: u64::from(entry.uncompressed_size()),
                        },
                        other => other.into(),
                    })?
            }
            method @ CompressionMethod::Unsupported(_) => {
                return Err(Error::UnsupportedCompression(method));
            }
        };

        if data.len() as u64 != u64::from(entry.uncompressed_size()) {
            return Err(Error::SizeMismatch {
                name: entry.name().to_string(),
                expected: u64::from(entry.uncompressed_size()),
                actual: data.len() as u64,
            });
        }

        let crc = ziptree_codec::crc32(&data);
        if crc != entry.crc32() {
            return Err(Error::ChecksumMismatch {
                name: entry.name().to_string(),
                expected: entry.crc32(),
                actual: crc,
            });
        }

        trace!("Inflated {:?}: {} -> {} bytes", entry.name(), raw.len(), data.len());
        Ok(data)
    }
}

impl fmt::Debug for ArchiveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveIndex")
            .field("len", &self.data.len())
            .field("eocd", &self.eocd)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArchiveWriter;
    use ziptree_common::ErrorKind;

    fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ArchiveWriter::new(Vec::new());
        for (name, data) in files {
            writer.add_file(name, data).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_open_lists_entries_in_order() {
        let data = archive(&[("b.txt", b"bee"), ("a.txt", b"ay")]);
        let index = ArchiveIndex::open(data).unwrap();

        let names: Vec<_> = index.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["b.txt", "a.txt"]);
        assert_eq!(index.entry_count(), index.eocd().entry_count as usize);
    }

    #[test]
    fn test_inflate() {
        let text = b"ABABABABABABABABABABABABABABABABABAB";
        let index = ArchiveIndex::open(archive(&[("ab.txt", text)])).unwrap();
        let entry = index.find("ab.txt").unwrap();

        assert_eq!(entry.compression_method(), CompressionMethod::Deflated);
        assert_eq!(index.inflate(entry).unwrap(), text);
    }

    #[test]
    fn test_corrupted_data_fails_checksum() {
        let mut data = archive(&[("a.txt", b"payload")]);
        let index = ArchiveIndex::open(data.clone()).unwrap();
        let range = index.compressed_range(&index.entries()[0]).unwrap();

        // Flip one stored bit inside the deflate stream's literal data
        data[range.start + 1] ^= 0x01;
        let index = ArchiveIndex::open(data).unwrap();
        let err = index.inflate(&index.entries()[0]).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidFormat | ErrorKind::CodecFailure
        ));
    }

    #[test]
    fn test_cancel_inflate() {
        let index = ArchiveIndex::open(archive(&[("a.txt", b"payload")])).unwrap();
        let mut cancel = |_: f32, stop: &mut bool| *stop = true;
        let err = index
            .inflate_with_progress(&index.entries()[0], Some(&mut cancel))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Canceled);
    }

    #[test]
    fn test_central_directory_length_checked() {
        let mut data = archive(&[("a.txt", b"x")]);
        let len = data.len();
        // Central directory size field of the EOCD
        data[len - 10] += 1;
        let err = ArchiveIndex::open(data).unwrap_err();
        assert!(matches!(err, Error::CentralDirectoryMismatch { .. }));
    }
}
