//! ZIP archive writer.

use std::io::Write;

use log::{debug, trace};
use rustc_hash::FxHashSet;
use ziptree_codec::{Progress, SharedCodec, WindowMode};
use ziptree_common::BinaryWriter;

use crate::entry::DosDateTime;
use crate::tree::{Directory, Node};
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, EndOfCentralDirectory, GeneralPurposeFlags,
    LocalFileHeader, HOST_UNIX, VERSION_20,
};
use crate::{Error, Result};

/// Settings applied to every entry written by an [`ArchiveWriter`].
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Timestamp stored in every header. Zero by default.
    pub modified: DosDateTime,
    /// Archive comment stored in the EOCD record.
    pub comment: Vec<u8>,
}

/// What the central directory needs to remember about a written entry.
#[derive(Debug)]
struct WrittenEntry {
    name: Vec<u8>,
    modified: DosDateTime,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

/// Writes a single-disk archive of DEFLATE entries with UTF-8 names.
///
/// Entries are written as they are added; the central directory and the
/// EOCD record are emitted by [`finish`](Self::finish).
///
/// # Example
///
/// ```
/// use ziptree_zip::{ArchiveTree, ArchiveWriter};
///
/// let mut writer = ArchiveWriter::new(Vec::new());
/// writer.add_file("docs/readme.txt", b"hello")?;
/// let bytes = writer.finish()?;
///
/// let tree = ArchiveTree::open(bytes)?;
/// assert_eq!(&*tree.file("docs/readme.txt")?.content()?, b"hello");
/// # Ok::<(), ziptree_zip::Error>(())
/// ```
pub struct ArchiveWriter<W: Write> {
    writer: BinaryWriter<W>,
    codec: SharedCodec,
    options: WriterOptions,
    entries: Vec<WrittenEntry>,
    /// Written file paths and the directories they imply, with empty
    /// components dropped the way the tree reader drops them.
    files: FxHashSet<String>,
    dirs: FxHashSet<String>,
}

impl<W: Write> ArchiveWriter<W> {
    /// Create a writer using the default codec.
    pub fn new(inner: W) -> Self {
        Self::with_codec(inner, ziptree_codec::default_codec())
    }

    pub fn with_codec(inner: W, codec: SharedCodec) -> Self {
        Self {
            writer: BinaryWriter::new(inner),
            codec,
            options: WriterOptions::default(),
            entries: Vec::new(),
            files: FxHashSet::default(),
            dirs: FxHashSet::default(),
        }
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of entries written so far.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.writer.position()
    }

    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.add_file_with_progress(name, data, None)
    }

    /// Compress `data` and write it as a local header plus payload.
    ///
    /// A name already written, or one that would make a file and a
    /// directory share a path, is rejected with [`Error::PathConflict`]
    /// before anything is written.
    pub fn add_file_with_progress(
        &mut self,
        name: &str,
        data: &[u8],
        progress: Option<Progress<'_>>,
    ) -> Result<()> {
        if name.is_empty() || name.ends_with('/') || name.len() > u16::MAX as usize {
            return Err(Error::InvalidName(name.to_string()));
        }
        if self.entries.len() >= u16::MAX as usize {
            return Err(Error::TooManyEntries(self.entries.len() + 1));
        }
        let (path, parents) = self.check_path(name)?;

        let local_header_offset = fit_u32("local header offset", self.writer.position())?;
        let uncompressed_size = fit_u32("uncompressed size", data.len() as u64)?;

        let compressed = self.codec.compress(data, WindowMode::Raw, progress)?;
        let compressed_size = fit_u32("compressed size", compressed.data.len() as u64)?;

        let entry = WrittenEntry {
            name: name.as_bytes().to_vec(),
            modified: self.options.modified,
            crc32: compressed.crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        };

        let header = LocalFileHeader {
            version_needed: VERSION_20,
            flags: GeneralPurposeFlags::UTF8.bits(),
            compression_method: CompressionMethod::Deflated.code(),
            last_modified_time: entry.modified.time,
            last_modified_date: entry.modified.date,
            crc32: entry.crc32,
            compressed_size,
            uncompressed_size,
            file_name_length: entry.name.len() as u16,
            extra_field_length: 0,
        };

        self.writer.write_u32(LocalFileHeader::SIGNATURE)?;
        self.writer.write_struct(&header)?;
        self.writer.write_bytes(&entry.name)?;
        self.writer.write_bytes(&compressed.data)?;

        trace!("Wrote {name:?}: {uncompressed_size} -> {compressed_size} bytes at {local_header_offset}");
        self.entries.push(entry);
        self.files.insert(path);
        self.dirs.extend(parents);
        Ok(())
    }

    /// Normalize `name` and make sure it fits beside the paths written so
    /// far. Returns the file path and its parent directories.
    fn check_path(&self, name: &str) -> Result<(String, Vec<String>)> {
        let components: Vec<&str> = name.split('/').filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            return Err(Error::InvalidName(name.to_string()));
        }

        let parents: Vec<String> = (1..components.len())
            .map(|depth| components[..depth].join("/"))
            .collect();
        let path = components.join("/");

        let conflict = self.files.contains(&path)
            || self.dirs.contains(&path)
            || parents.iter().any(|dir| self.files.contains(dir));
        if conflict {
            return Err(Error::PathConflict(name.to_string()));
        }
        Ok((path, parents))
    }

    /// Write every file below `dir`, naming each `prefix` + its path.
    ///
    /// Children are visited in name order. Archived files are inflated if
    /// they have not been yet.
    pub fn add_directory(&mut self, dir: &Directory, prefix: &str) -> Result<()> {
        for (name, node) in dir {
            match node {
                Node::File(file) => {
                    let data = file.content()?;
                    self.add_file(&format!("{prefix}{name}"), &data)?;
                }
                Node::Directory(child) => {
                    self.add_directory(child, &format!("{prefix}{name}/"))?;
                }
            }
        }
        Ok(())
    }

    /// Write the central directory and EOCD record, returning the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let central_dir_start = self.writer.position();
        let central_dir_offset = fit_u32("central directory offset", central_dir_start)?;

        for entry in &self.entries {
            let header = CentralDirectoryHeader {
                version_made_by: (HOST_UNIX << 8) | VERSION_20,
                version_needed: VERSION_20,
                flags: GeneralPurposeFlags::UTF8.bits(),
                compression_method: CompressionMethod::Deflated.code(),
                last_modified_time: entry.modified.time,
                last_modified_date: entry.modified.date,
                crc32: entry.crc32,
                compressed_size: entry.compressed_size,
                uncompressed_size: entry.uncompressed_size,
                file_name_length: entry.name.len() as u16,
                extra_field_length: 0,
                file_comment_length: 0,
                disk_number_start: 0,
                internal_attrs: 0,
                external_attrs: 0,
                local_header_offset: entry.local_header_offset,
            };

            self.writer.write_u32(CentralDirectoryHeader::SIGNATURE)?;
            self.writer.write_struct(&header)?;
            self.writer.write_bytes(&entry.name)?;
        }

        let central_dir_size =
            fit_u32("central directory size", self.writer.position() - central_dir_start)?;

        let eocd = EndOfCentralDirectory {
            offset: self.writer.position() as usize,
            entry_count: self.entries.len() as u16,
            central_dir_size,
            central_dir_offset,
            comment: std::mem::take(&mut self.options.comment),
        };
        eocd.write(&mut self.writer)?;
        self.writer.flush()?;

        debug!(
            "Finished archive: {} entries, {} bytes",
            self.entries.len(),
            self.writer.position()
        );
        Ok(self.writer.into_inner())
    }
}

fn fit_u32(what: &'static str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge { what, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArchiveIndex, ArchiveTree};

    #[test]
    fn test_empty_archive() {
        let bytes = ArchiveWriter::new(Vec::new()).finish().unwrap();
        assert_eq!(bytes.len(), 22);

        let index = ArchiveIndex::open(bytes).unwrap();
        assert_eq!(index.entry_count(), 0);
    }

    #[test]
    fn test_header_fields() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_file("\u{65e5}.txt", b"text").unwrap();
        let index = ArchiveIndex::open(writer.finish().unwrap()).unwrap();
        let entry = &index.entries()[0];

        assert_eq!(entry.name(), "\u{65e5}.txt");
        assert!(entry.flags().contains(GeneralPurposeFlags::UTF8));
        assert_eq!(entry.version_needed(), 20);
        assert_eq!(entry.version_made_by() & 0xFF, 20);
        assert_eq!(entry.compression_method(), CompressionMethod::Deflated);
        assert_eq!(entry.local_header_offset(), 0);
        assert_eq!(entry.crc32(), ziptree_codec::crc32(b"text"));
        assert_eq!(entry.modified(), DosDateTime::default());
    }

    #[test]
    fn test_options() {
        let stamp = DosDateTime::from_parts(2001, 2, 3, 4, 5, 6).unwrap();
        let mut writer = ArchiveWriter::new(Vec::new()).with_options(WriterOptions {
            modified: stamp,
            comment: b"note".to_vec(),
        });
        writer.add_file("a", b"").unwrap();
        let index = ArchiveIndex::open(writer.finish().unwrap()).unwrap();

        assert_eq!(index.comment(), b"note");
        assert_eq!(index.entries()[0].modified(), stamp);
        assert!(index.inflate(&index.entries()[0]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let mut writer = ArchiveWriter::new(Vec::new());
        assert!(matches!(writer.add_file("", b""), Err(Error::InvalidName(_))));
        assert!(matches!(writer.add_file("dir/", b""), Err(Error::InvalidName(_))));

        let long = "n".repeat(u16::MAX as usize + 1);
        let err = writer.add_file(&long, b"").unwrap_err();
        assert_eq!(err.kind(), ziptree_common::ErrorKind::UnsupportedFormat);
        assert_eq!(writer.entry_count(), 0);
    }

    #[test]
    fn test_add_directory_uses_prefix() {
        let mut tree = ArchiveTree::new();
        tree.insert_file("x/y.txt", b"y".to_vec()).unwrap();
        tree.insert_file("z.txt", b"z".to_vec()).unwrap();

        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_directory(tree.root(), "base/").unwrap();
        let index = ArchiveIndex::open(writer.finish().unwrap()).unwrap();

        let names: Vec<_> = index.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["base/x/y.txt", "base/z.txt"]);
    }

    #[test]
    fn test_conflicting_paths_rejected() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_file("a.txt", b"one").unwrap();
        writer.add_file("dir/b.txt", b"two").unwrap();
        let written = writer.position();

        for name in ["a.txt", "dir", "a.txt/c", "dir//b.txt"] {
            let err = writer.add_file(name, b"x").unwrap_err();
            assert!(matches!(err, Error::PathConflict(_)), "{name}");
            assert_eq!(err.kind(), ziptree_common::ErrorKind::InvalidFormat);
        }
        assert_eq!(writer.entry_count(), 2);
        assert_eq!(writer.position(), written);

        writer.add_file("dir/c.txt", b"three").unwrap();
        let tree = ArchiveTree::open(writer.finish().unwrap()).unwrap();
        assert_eq!(&*tree.file("a.txt").unwrap().content().unwrap(), b"one");
        assert_eq!(tree["dir"].as_dir().unwrap().len(), 2);
    }
}
