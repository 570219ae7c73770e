//! # emberkv
//!
//! An embeddable, ordered key-value store core built on a
//! **Log-Structured Merge (LSM) tree** over byte-string keys and
//! byte-string values.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     Coordinator                        │
//! │  ┌────────────┐  ┌──────────────┐  ┌─────────────┐    │
//! │  │  Active     │  │  Flushing    │  │  SSTables   │    │
//! │  │  MemTable   │  │  MemTable    │  │  (on disk)  │    │
//! │  └─────┬───────┘  └──────┬───────┘  └──────┬──────┘    │
//! │        │   overflow      │   background    │           │
//! │        └─────────►       └──────flush────► │           │
//! │                                            │           │
//! │  ┌──────────────────────────────────────────┘           │
//! │  │  Background compaction (merge all, drop tombstones) │
//! │  └──────────────────────────────────────────────────────┘
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`coordinator`] | The public entry point — open, get, upsert, flush, compact, close |
//! | [`memtable`] | In-memory ordered write buffer with a soft overflow signal |
//! | [`sstable`] | Immutable, sorted, on-disk tables (uncompressed or LZ4-block-compressed) |
//! | [`merge`] | The N-way priority merge iterator and its tombstone-filtering adapter |
//! | [`compression`] | The pluggable `BlockCompressor` capability |
//! | [`encoding`] | Deterministic little-endian binary encoding for the on-disk format |
//! | [`entry`] | The `Entry`/`Value` currency type |
//! | [`key_order`] | The unsigned lexicographic byte-string total order |
//! | [`error`] | The crate-wide `StoreError` |
//!
//! ## Key properties
//!
//! - **Single-version entries** — one value or tombstone per key, shadowed
//!   by write/flush/compaction recency, not by a logical clock.
//! - **Dual-memtable flush pipeline** — writes never block on flush I/O;
//!   at most one background flush and one background compaction run at a
//!   time, on a single worker thread.
//! - **Pluggable block compression** — SSTables are written uncompressed or
//!   LZ4-block-compressed, sharing one on-disk entry codec either way.
//! - **Durability by construction, not by WAL** — a complete SSTable triple
//!   is durable; an incomplete one (a crash mid-write) is an ignorable
//!   orphan discovered and discarded on the next `open`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use emberkv::coordinator::{Coordinator, CoordinatorConfig};
//! use emberkv::sstable::writer::CompressionConfig;
//! use emberkv::entry::Entry;
//!
//! let config = CoordinatorConfig {
//!     flush_threshold_bytes: 4 * 1024 * 1024,
//!     compression: CompressionConfig::Lz4 { uncompressed_block_size: 4096 },
//! };
//! let store = Coordinator::open("/tmp/my_store", config).unwrap();
//!
//! store.upsert(Entry::put("hello", "world")).unwrap();
//! assert_eq!(store.get(b"hello").unwrap(), Some(Entry::put("hello", "world")));
//!
//! store.upsert(Entry::tombstone("hello")).unwrap();
//! assert_eq!(store.get(b"hello").unwrap(), None);
//!
//! store.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod compression;
pub mod coordinator;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod key_order;
pub mod memtable;
pub mod merge;
pub mod sstable;
