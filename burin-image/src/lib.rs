//! Byte store and executable image views.
//!
//! [`ByteStore`] is a mutable byte sequence with per-byte modification
//! tracking, grouped undo/redo and observer notifications. An [`Image`] is
//! built over a store by one of the container parsers (ELF, PE, Mach-O) or
//! from raw bytes, and projects the store into a sparse virtual address
//! space with symbol and PLT tables.

#![warn(missing_docs)]

mod access;
mod elf;
mod image;
mod macho;
mod pe;
mod reader;
mod store;

pub use access::AddressSpace;
pub use image::{Format, Image, ImageObserver, Segment, SegmentPerms, SymbolTable};
pub use store::{ByteStore, ModTag, StoreObserver};

/// Container parsing failure. The whole file is still usable as raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The magic number did not match the format.
    #[error("unrecognized magic number")]
    BadMagic,
    /// A required structure ran past the end of the file.
    #[error("truncated {0}")]
    Truncated(&'static str),
    /// The file matched the magic but uses an unsupported variant.
    #[error("unsupported {0}")]
    Unsupported(&'static str),
}
