//! GZIP envelope support for ziptree.
//!
//! A GZIP file wraps one DEFLATE stream in a small header (magic, method,
//! flags, modification time, OS byte and optional extra, name, comment and
//! header CRC fields) and an 8-byte CRC-32/size trailer. [`GzipHeader`]
//! parses and serializes the header; [`GzipFile`] pairs it with the
//! uncompressed contents and delegates the payload to a
//! [`Codec`](ziptree_codec::Codec).

mod error;
mod file;

pub mod header;

pub use error::{Error, Result};
pub use file::GzipFile;
pub use header::{GzipHeader, OperatingSystem};
