//! The single background worker thread that services flush and compaction
//! tasks: exactly one thread, fed over a channel, so "at most
//! one flush and at most one compaction run concurrently" holds trivially.
//! The two kinds of task are additionally fully serialized with each
//! other rather than run on separate threads, trading a little potential
//! overlap for a much simpler concurrency model.

use std::fs;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use tracing::{error, info};

use crate::coordinator::Shared;
use crate::entry::Entry;
use crate::error::StoreError;
use crate::memtable::MemTable;
use crate::merge::{MergeIterator, PointerIterator, TombstoneFilter};
use crate::sstable::SSTableReader;
use crate::sstable::format::SSTablePaths;
use crate::sstable::iterator::SSTablePointerIterator;
use crate::sstable::writer::SSTableWriter;

/// A unit of work dispatched to the background worker.
pub enum Task {
    /// Serialize `memtable` to a new SSTable at `generation` and install it.
    Flush {
        memtable: Arc<MemTable>,
        generation: u64,
    },
    /// Merge `tables` into a single replacement SSTable at `generation`,
    /// dropping tombstones, then install it and delete the superseded files.
    Compact {
        tables: Vec<Arc<SSTableReader>>,
        generation: u64,
    },
    /// Stop processing further tasks.
    Shutdown,
}

/// The worker loop: run until [`Task::Shutdown`], recording the first
/// failure of each kind on `shared.last_error` for the next caller that
/// awaits it (`flush()`/`close()`).
pub fn run(shared: Arc<Shared>, tasks: Receiver<Task>) {
    while let Ok(task) = tasks.recv() {
        match task {
            Task::Shutdown => break,
            Task::Flush {
                memtable,
                generation,
            } => {
                if let Err(e) = do_flush(&shared, &memtable, generation) {
                    error!(generation, error = %e, "background flush failed");
                    *shared.last_error.lock().unwrap_or_else(|p| p.into_inner()) =
                        Some(StoreError::FlushFailure(e.to_string()));
                }
            }
            Task::Compact { tables, generation } => {
                if let Err(e) = do_compact(&shared, tables, generation) {
                    error!(generation, error = %e, "background compaction failed");
                    *shared.last_error.lock().unwrap_or_else(|p| p.into_inner()) =
                        Some(StoreError::CompactionFailure(e.to_string()));
                }
            }
        }
    }
}

fn do_flush(shared: &Shared, memtable: &MemTable, generation: u64) -> Result<(), StoreError> {
    let entries = memtable.snapshot();
    let entry_count = entries.len();
    let paths = SSTablePaths::for_generation(&shared.storage_dir, generation);
    SSTableWriter::write(entries.into_iter(), &paths, shared.compression)?;
    let reader = Arc::new(SSTableReader::open(&paths, generation)?);

    let mut inner = shared.state.write().unwrap_or_else(|p| p.into_inner());
    inner.tables.push(reader);
    inner.flushing = Arc::new(MemTable::new(None));
    drop(inner);

    info!(generation, entries = entry_count, "flush completed");
    Ok(())
}

fn do_compact(
    shared: &Shared,
    tables: Vec<Arc<SSTableReader>>,
    generation: u64,
) -> Result<(), StoreError> {
    let superseded_generations: Vec<u64> = tables.iter().map(|t| t.generation()).collect();

    let sources: Result<Vec<Box<dyn PointerIterator>>, StoreError> = tables
        .iter()
        .map(|t| {
            SSTablePointerIterator::new(t.clone(), None, None)
                .map(|it| Box::new(it) as Box<dyn PointerIterator>)
        })
        .collect();
    let merged = TombstoneFilter::new(MergeIterator::new(sources?));

    let mut entries: Vec<Entry> = Vec::new();
    for entry in merged {
        entries.push(entry?);
    }
    let entry_count = entries.len();

    let staging = SSTablePaths::compacted_staging(&shared.storage_dir);
    SSTableWriter::write(entries.into_iter(), &staging, shared.compression)?;

    let final_paths = SSTablePaths::for_generation(&shared.storage_dir, generation);
    fs::rename(&staging.data, &final_paths.data)?;
    fs::rename(&staging.index, &final_paths.index)?;
    fs::rename(&staging.compression_info, &final_paths.compression_info)?;
    let reader = Arc::new(SSTableReader::open(&final_paths, generation)?);

    let mut inner = shared.state.write().unwrap_or_else(|p| p.into_inner());
    inner
        .tables
        .retain(|t| !superseded_generations.contains(&t.generation()));
    inner.tables.push(reader);
    inner.tables.sort_unstable_by_key(|t| t.generation());
    drop(inner);

    for generation in superseded_generations {
        let paths = SSTablePaths::for_generation(&shared.storage_dir, generation);
        let _ = fs::remove_file(&paths.data);
        let _ = fs::remove_file(&paths.index);
        let _ = fs::remove_file(&paths.compression_info);
    }

    info!(generation, entries = entry_count, "compaction completed");
    Ok(())
}
