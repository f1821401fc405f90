//! ZIP archive support for ziptree.
//!
//! This crate reads an archive held in memory into an [`ArchiveIndex`],
//! presents it as an [`ArchiveTree`] whose files inflate lazily, and writes
//! trees (or individual files) back out with [`ArchiveWriter`].
//!
//! Only single-disk, non-ZIP64 archives with stored or DEFLATE entries can
//! be extracted. Written archives always use DEFLATE and UTF-8 names.
//!
//! # Example
//!
//! ```
//! use ziptree_zip::ArchiveTree;
//!
//! let mut tree = ArchiveTree::new();
//! tree.insert_file("a/b/c.txt", b"hello".to_vec())?;
//! let bytes = tree.serialize()?;
//!
//! let tree = ArchiveTree::open(bytes)?;
//! let file = tree.file("a/b/c.txt")?;
//! assert_eq!(&*file.content()?, b"hello");
//! # Ok::<(), ziptree_zip::Error>(())
//! ```

pub mod zip;

mod entry;
mod error;
mod index;
mod tree;
mod writer;

pub use entry::{CentralDirectoryEntry, DosDateTime, LocalEntry};
pub use error::{Error, Result};
pub use index::ArchiveIndex;
pub use tree::{ArchiveTree, Directory, FileNode, Node};
pub use writer::{ArchiveWriter, WriterOptions};
pub use zip::{CompressionMethod, GeneralPurposeFlags};
