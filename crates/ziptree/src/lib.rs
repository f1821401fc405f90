//! ziptree - ZIP archives as lazily inflated directory trees, plus GZIP envelopes.
//!
//! This crate provides a unified interface to the ziptree crates.
//!
//! # Crates
//!
//! - [`ziptree_common`] - Binary reading/writing, legacy text, error kinds
//! - [`ziptree_codec`] - DEFLATE codec with chunked progress and cancellation
//! - [`ziptree_zip`] - ZIP reading, directory trees and writing
//! - [`ziptree_gzip`] - GZIP header and single-file envelope
//!
//! # Example
//!
//! ```
//! use ziptree::prelude::*;
//!
//! let mut tree = ArchiveTree::new();
//! tree.insert_file("docs/readme.txt", b"read me".to_vec())?;
//! let archive = tree.serialize()?;
//!
//! let tree = ArchiveTree::open(archive)?;
//! if let Some(Node::Directory(docs)) = tree.get("docs") {
//!     for (name, node) in docs {
//!         if let Node::File(file) = node {
//!             println!("{name}: {} bytes", file.content()?.len());
//!         }
//!     }
//! }
//!
//! let gz = GzipFile::new(Some("readme.txt"), b"read me".to_vec())?.encode()?;
//! assert_eq!(GzipFile::decode(&gz)?.contents(), b"read me");
//! # Ok::<(), ziptree::Error>(())
//! ```

use thiserror::Error;

// Re-export all sub-crates
pub use ziptree_codec as codec;
pub use ziptree_common as common;
pub use ziptree_gzip as gzip;
pub use ziptree_zip as zip;

pub use ziptree_common::ErrorKind;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use ziptree_codec::{Codec, FlateCodec, SharedCodec, WindowMode};
    pub use ziptree_common::ErrorKind;
    pub use ziptree_gzip::{GzipFile, GzipHeader};
    pub use ziptree_zip::{
        ArchiveIndex, ArchiveTree, ArchiveWriter, CentralDirectoryEntry, Directory, FileNode,
        Node, WriterOptions,
    };
}

/// Any ziptree error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Zip(#[from] ziptree_zip::Error),

    #[error(transparent)]
    Gzip(#[from] ziptree_gzip::Error),

    #[error(transparent)]
    Codec(#[from] ziptree_codec::Error),
}

impl Error {
    /// Get the broad error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Zip(err) => err.kind(),
            Self::Gzip(err) => err.kind(),
            Self::Codec(err) => err.kind(),
        }
    }
}

/// Result type using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
