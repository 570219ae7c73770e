//! Crate-wide error type.
//!
//! Every fallible entry point on [`crate::coordinator::Coordinator`] returns
//! [`StoreError`]. Lower layers (`encoding`, `compression`, `sstable`) define
//! their own small `thiserror` enums and convert into `StoreError` at the
//! module boundary.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::compression::CompressionError;
use crate::encoding::EncodingError;
use crate::memtable::MemTableError;
use crate::sstable::SSTableError;

/// Errors produced by the store's public surface.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// `upsert` was rejected: the active memtable is already at or above
    /// its flush threshold and no flushing slot is available to relieve it.
    #[error("memtable out of memory: no flush slot available")]
    OutOfMemory,

    /// `flush()` was called explicitly while a prior flush is still in
    /// progress.
    #[error("a flush is already in progress")]
    TooManyFlushes,

    /// An underlying filesystem operation failed.
    #[error("I/O failure: {0}")]
    IoFailure(Arc<io::Error>),

    /// A background compaction task failed; surfaced on the next call that
    /// awaits its handle.
    #[error("compaction failed: {0}")]
    CompactionFailure(String),

    /// A background flush task failed; surfaced on the next call that
    /// awaits its handle.
    #[error("flush failed: {0}")]
    FlushFailure(String),

    /// The store could not be opened (directory scan, SSTable load, or
    /// mapping failure).
    #[error("store could not be created: {0}")]
    CreationFailure(String),

    /// `next` was called on an exhausted iterator, or an operation was
    /// attempted after `close`.
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::IoFailure(Arc::new(e))
    }
}

impl From<EncodingError> for StoreError {
    fn from(e: EncodingError) -> Self {
        StoreError::CreationFailure(format!("encoding error: {e}"))
    }
}

impl From<CompressionError> for StoreError {
    fn from(e: CompressionError) -> Self {
        StoreError::CreationFailure(format!("compression error: {e}"))
    }
}

impl From<MemTableError> for StoreError {
    fn from(e: MemTableError) -> Self {
        match e {
            MemTableError::OutOfMemory => StoreError::OutOfMemory,
        }
    }
}

impl From<SSTableError> for StoreError {
    fn from(e: SSTableError) -> Self {
        match e {
            SSTableError::Io(inner) => StoreError::IoFailure(Arc::new(inner)),
            SSTableError::Encoding(inner) => inner.into(),
            SSTableError::Compression(inner) => inner.into(),
            other => StoreError::CreationFailure(other.to_string()),
        }
    }
}
