//! Common utilities for ziptree.
//!
//! This crate provides the foundational types shared by the container crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian decoding from byte slices
//! - [`BinaryWriter`] - Little-endian encoding into any [`std::io::Write`] with offset tracking
//! - [`text`] - UTF-8 and legacy 8-bit text conversion for stored names
//! - [`ErrorKind`] - The error taxonomy every ziptree error maps onto

mod error;
mod reader;
mod writer;

pub mod text;

pub use error::{Error, ErrorKind, Result};
pub use reader::BinaryReader;
pub use writer::BinaryWriter;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
