//! The immutable, on-disk sorted table: its binary format, writer,
//! reader, and the `PointerIterator` that drives the merge
//! over it.
//!
//! A table lives as a triple of files — data, index, compression-info —
//! sharing one `generation` number used both for file naming and for merge
//! priority (higher generation wins on a key tie among SSTables).

pub mod format;
pub mod iterator;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod tests;

use std::io;

use thiserror::Error;

pub use format::SSTablePaths;
pub use reader::SSTableReader;
pub use writer::{CompressionConfig, SSTableWriter};

use crate::compression::CompressionError;
use crate::encoding::EncodingError;

/// Errors raised by the SSTable writer and reader.
#[derive(Debug, Error)]
pub enum SSTableError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A field failed to decode.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A block failed to compress or decompress.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// The table's on-disk bytes are internally inconsistent (truncated
    /// entry, index slot out of bounds, unrecognized `algorithm` byte).
    #[error("corrupt SSTable: {0}")]
    Corrupt(String),
}
