//! The Coordinator: owns the active/flushing memtables and the
//! loaded SSTable list, schedules at most one background flush and one
//! background compaction at a time, and serves reads as a merge over all
//! live sources.
//!
//! This is the crate's public entry point — the only thing external code
//! constructs and calls. Everything else in the crate (`memtable`, `merge`,
//! `sstable`, `compression`, `encoding`) is a leaf the Coordinator composes.

mod background;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam::channel::Sender;
use tracing::{debug, info, warn};

use crate::entry::Entry;
use crate::error::StoreError;
use crate::memtable::MemTable;
use crate::merge::{MergeIterator, PointerIterator, TombstoneFilter};
use crate::sstable::SSTableReader;
use crate::sstable::format::SSTablePaths;
use crate::sstable::iterator::SSTablePointerIterator;
pub use crate::sstable::writer::CompressionConfig;

use background::Task;

/// Configuration recognized by the core: the flush threshold and the
/// on-disk layout. `storageDir` is taken as a separate argument to
/// [`Coordinator::open`] rather than a config field, matching the
/// `open(storageDir, config)` signature.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub flush_threshold_bytes: usize,
    pub compression: CompressionConfig,
}

impl CoordinatorConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.flush_threshold_bytes == 0 {
            return Err(StoreError::CreationFailure(
                "flushThresholdBytes must be > 0".into(),
            ));
        }
        if let CompressionConfig::Lz4 {
            uncompressed_block_size,
        } = self.compression
            && uncompressed_block_size == 0
        {
            return Err(StoreError::CreationFailure(
                "blockSize must be > 0 when compression is lz4".into(),
            ));
        }
        Ok(())
    }
}

struct Inner {
    active: Arc<MemTable>,
    flushing: Arc<MemTable>,
    /// Ascending by generation; position n has priority lower than n+1.
    tables: Vec<Arc<SSTableReader>>,
}

/// State shared between the `Coordinator` handle and the background
/// worker thread.
struct Shared {
    state: RwLock<Inner>,
    storage_dir: PathBuf,
    compression: CompressionConfig,
    flush_threshold: usize,
    next_generation: AtomicU64,
    /// The first background failure not yet reported to a caller:
    /// taken (and cleared) by the next `flush()` or `close()`.
    last_error: Mutex<Option<StoreError>>,
}

/// An open LSM store. Construct with [`Coordinator::open`]; call
/// [`Coordinator::close`] when done (idempotent, but recommended so the
/// active memtable and any in-flight background work are persisted before
/// the process exits).
pub struct Coordinator {
    shared: Arc<Shared>,
    task_tx: Sender<Task>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Coordinator {
    /// Bootstraps a store over `storage_dir`: creates the
    /// directory if absent, loads every complete SSTable triple found,
    /// discards orphaned `.tmp` leftovers from a crash mid-write, and
    /// starts the background worker.
    pub fn open(storage_dir: impl AsRef<Path>, config: CoordinatorConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let storage_dir = storage_dir.as_ref().to_path_buf();
        fs::create_dir_all(&storage_dir)?;

        let mut generations: Vec<u64> = Vec::new();
        for dir_entry in fs::read_dir(&storage_dir)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("sstable_")
                && let Some(gen_str) = rest.strip_suffix(".data")
                && let Ok(generation) = gen_str.parse::<u64>()
            {
                generations.push(generation);
            }
        }
        generations.sort_unstable();
        generations.dedup();

        let mut tables = Vec::with_capacity(generations.len());
        for generation in &generations {
            let paths = SSTablePaths::for_generation(&storage_dir, *generation);
            if !paths.all_exist() {
                warn!(generation, "orphaned incomplete SSTable triple, skipping");
                continue;
            }
            tables.push(Arc::new(SSTableReader::open(&paths, *generation)?));
        }

        for dir_entry in fs::read_dir(&storage_dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                warn!(?path, "removing orphaned .tmp file left by a crash mid-write");
                let _ = fs::remove_file(&path);
            }
        }

        let next_generation = generations.last().map(|g| g + 1).unwrap_or(0);

        let shared = Arc::new(Shared {
            state: RwLock::new(Inner {
                active: Arc::new(MemTable::new(Some(config.flush_threshold_bytes))),
                flushing: Arc::new(MemTable::new(None)),
                tables,
            }),
            storage_dir,
            compression: config.compression,
            flush_threshold: config.flush_threshold_bytes,
            next_generation: AtomicU64::new(next_generation),
            last_error: Mutex::new(None),
        });

        let (task_tx, task_rx) = crossbeam::channel::unbounded();
        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("coordinator-worker".into())
            .spawn(move || background::run(worker_shared, task_rx))
            .map_err(|e| StoreError::CreationFailure(e.to_string()))?;

        info!(
            tables = shared.state.read().unwrap_or_else(|p| p.into_inner()).tables.len(),
            "store opened"
        );

        Ok(Self {
            shared,
            task_tx,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::PreconditionViolation(
                "operation attempted after close".into(),
            ))
        } else {
            Ok(())
        }
    }

    fn dispatch_flush(&self, memtable: Arc<MemTable>) {
        let generation = self.shared.next_generation.fetch_add(1, Ordering::AcqRel);
        debug!(generation, "dispatching flush");
        let _ = self.task_tx.send(Task::Flush {
            memtable,
            generation,
        });
    }

    /// Inserts or updates `entry`. On overflow of the active memtable,
    /// swaps it into the flushing slot and dispatches a background flush
    /// — unless a flush is already in progress, in which case this
    /// internal overflow path is tolerant and simply returns (subsequent
    /// calls will see `OutOfMemory` from the memtable itself once it is
    /// genuinely full).
    pub fn upsert(&self, entry: Entry) -> Result<(), StoreError> {
        self.check_open()?;
        let active = {
            let inner = self.shared.state.read().unwrap_or_else(|p| p.into_inner());
            inner.active.clone()
        };
        let overflowed = active.upsert(entry)?;
        if overflowed {
            let mut inner = self.shared.state.write().unwrap_or_else(|p| p.into_inner());
            if inner.flushing.is_empty() {
                let fresh = Arc::new(MemTable::new(Some(self.shared.flush_threshold)));
                let swapped_out = std::mem::replace(&mut inner.active, fresh);
                inner.flushing = swapped_out.clone();
                drop(inner);
                self.dispatch_flush(swapped_out);
            }
        }
        Ok(())
    }

    /// Explicitly schedules a flush of the active memtable. Fails with
    /// [`StoreError::TooManyFlushes`] if one is already in progress; is a
    /// no-op if the active memtable is empty.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.check_open()?;
        if let Some(err) = self.shared.last_error.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(err);
        }
        let mut inner = self.shared.state.write().unwrap_or_else(|p| p.into_inner());
        if !inner.flushing.is_empty() {
            return Err(StoreError::TooManyFlushes);
        }
        if inner.active.is_empty() {
            return Ok(());
        }
        let fresh = Arc::new(MemTable::new(Some(self.shared.flush_threshold)));
        let swapped_out = std::mem::replace(&mut inner.active, fresh);
        inner.flushing = swapped_out.clone();
        drop(inner);
        self.dispatch_flush(swapped_out);
        Ok(())
    }

    /// Schedules a compaction of all currently loaded SSTables into one,
    /// dropping tombstones. No-op if there is at most one table already.
    pub fn compact(&self) -> Result<(), StoreError> {
        self.check_open()?;
        let tables = {
            let inner = self.shared.state.read().unwrap_or_else(|p| p.into_inner());
            inner.tables.clone()
        };
        if tables.len() <= 1 {
            return Ok(());
        }
        let generation = self.shared.next_generation.fetch_add(1, Ordering::AcqRel);
        debug!(generation, tables = tables.len(), "dispatching compaction");
        let _ = self.task_tx.send(Task::Compact { tables, generation });
        Ok(())
    }

    /// Point lookup, consulting the active memtable, then the flushing
    /// memtable, then loaded SSTables newest-first. A tombstone at any
    /// layer shadows everything older and is reported as absence.
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>, StoreError> {
        self.check_open()?;
        let (active, flushing, tables) = {
            let inner = self.shared.state.read().unwrap_or_else(|p| p.into_inner());
            (inner.active.clone(), inner.flushing.clone(), inner.tables.clone())
        };

        if let Some(e) = active.get(key) {
            return Ok(non_tombstone(e));
        }
        if let Some(e) = flushing.get(key) {
            return Ok(non_tombstone(e));
        }
        for table in tables.iter().rev() {
            if let Some(e) = table.get(key)? {
                return Ok(non_tombstone(e));
            }
        }
        Ok(None)
    }

    /// Half-open range scan `[from, to)`, merging the active memtable, the
    /// flushing memtable, and every loaded SSTable by priority, with
    /// tombstones filtered out.
    pub fn get_range(
        &self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
    ) -> Result<TombstoneFilter, StoreError> {
        self.check_open()?;
        let (active, flushing, tables) = {
            let inner = self.shared.state.read().unwrap_or_else(|p| p.into_inner());
            (inner.active.clone(), inner.flushing.clone(), inner.tables.clone())
        };

        let mut sources: Vec<Box<dyn PointerIterator>> = Vec::with_capacity(tables.len() + 2);
        sources.push(Box::new(active.iterator(from, to, 0)));
        sources.push(Box::new(flushing.iterator(from, to, 1)));
        for table in tables {
            sources.push(Box::new(SSTablePointerIterator::new(table, from, to)?));
        }
        Ok(TombstoneFilter::new(MergeIterator::new(sources)))
    }

    /// Idempotent shutdown: stops the background worker (awaiting any
    /// flush/compaction already in flight), surfaces a pending background
    /// failure if one occurred, then synchronously persists the active
    /// memtable as one final SSTable if it is non-empty.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let _ = self.task_tx.send(Task::Shutdown);
        if let Some(handle) = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take() {
            let _ = handle.join();
        }

        if let Some(err) = self.shared.last_error.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(err);
        }

        let entries = {
            let inner = self.shared.state.read().unwrap_or_else(|p| p.into_inner());
            if inner.active.is_empty() {
                None
            } else {
                Some(inner.active.snapshot())
            }
        };

        if let Some(entries) = entries {
            let generation = self.shared.next_generation.fetch_add(1, Ordering::AcqRel);
            let paths = SSTablePaths::for_generation(&self.shared.storage_dir, generation);
            crate::sstable::writer::SSTableWriter::write(
                entries.into_iter(),
                &paths,
                self.shared.compression,
            )?;
            let reader = Arc::new(SSTableReader::open(&paths, generation)?);
            let mut inner = self.shared.state.write().unwrap_or_else(|p| p.into_inner());
            inner.tables.push(reader);
            info!(generation, "persisted active memtable on close");
        }

        Ok(())
    }
}

fn non_tombstone(e: Entry) -> Option<Entry> {
    if e.is_tombstone() { None } else { Some(e) }
}

#[cfg(test)]
impl Coordinator {
    /// Test-only introspection: the number of currently loaded SSTables.
    pub(crate) fn table_count(&self) -> usize {
        self.shared
            .state
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .tables
            .len()
    }

    /// Test-only introspection: whether the flushing slot currently holds
    /// an in-progress flush.
    pub(crate) fn is_flushing(&self) -> bool {
        !self
            .shared
            .state
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .flushing
            .is_empty()
    }
}
