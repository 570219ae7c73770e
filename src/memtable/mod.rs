//! The in-memory ordered write buffer.
//!
//! A [`MemTable`] is a `BTreeMap<Vec<u8>, Entry>` behind a single-writer
//! `RwLock`, plus an atomically-updated byte counter approximating its
//! occupied size. It signals overflow when that counter reaches a
//! configured `flush_threshold`; the coordinator (`crate::coordinator`)
//! reacts to the signal by swapping memtables and dispatching a flush.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::trace;

use crate::entry::Entry;
use crate::key_order;
use crate::merge::{MAX_PRIORITY, PointerIterator};

/// Errors raised by [`MemTable::upsert`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemTableError {
    /// The memtable is already at or above its flush threshold and cannot
    /// accept another entry until it is relieved by a flush.
    #[error("memtable is at or above its flush threshold")]
    OutOfMemory,
}

/// Fixed per-entry overhead counted toward a memtable's approximate byte
/// size, matching [`Entry::approximate_size`].
const PER_ENTRY_OVERHEAD: usize = 32;

/// An in-memory ordered map of keys to entries, with size accounting and a
/// soft overflow signal.
///
/// `flush_threshold = None` is the "no threshold" sentinel: used for
/// the coordinator's flushing slot and, momentarily, for a fresh `active`
/// memtable before its threshold is set. When `None`, `upsert` never
/// rejects and always reports `overflowed = false`.
pub struct MemTable {
    tree: RwLock<BTreeMap<Vec<u8>, Entry>>,
    byte_size: AtomicUsize,
    flush_threshold: Option<usize>,
}

impl MemTable {
    /// Creates an empty memtable with the given flush threshold.
    pub fn new(flush_threshold: Option<usize>) -> Self {
        Self {
            tree: RwLock::new(BTreeMap::new()),
            byte_size: AtomicUsize::new(0),
            flush_threshold,
        }
    }

    /// Inserts or updates `entry`.
    ///
    /// Rejects with [`MemTableError::OutOfMemory`], without inserting, when
    /// a threshold is configured and the memtable is already at or above
    /// it. Otherwise inserts (crediting the byte counter for the new entry
    /// and debiting it for any entry displaced at the same key) and returns
    /// whether the post-insert size has reached the threshold — the signal
    /// the coordinator uses to trigger a flush.
    pub fn upsert(&self, entry: Entry) -> Result<bool, MemTableError> {
        if let Some(threshold) = self.flush_threshold
            && self.byte_size.load(Ordering::Acquire) >= threshold
        {
            return Err(MemTableError::OutOfMemory);
        }

        let added = entry.approximate_size();
        let mut tree = self
            .tree
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = tree.insert(entry.key.clone(), entry);
        drop(tree);

        if let Some(previous) = previous {
            self.byte_size
                .fetch_sub(previous.approximate_size(), Ordering::AcqRel);
        }
        let new_size = self.byte_size.fetch_add(added, Ordering::AcqRel) + added;

        let overflowed = self.flush_threshold.is_some_and(|t| new_size >= t);
        trace!(bytes = new_size, overflowed, "memtable upsert");
        Ok(overflowed)
    }

    /// Exact lookup. Returns `None` if the key has never been written to
    /// this memtable (not even as a tombstone).
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        let tree = self
            .tree
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tree.get(key).cloned()
    }

    /// `true` if the memtable holds no entries.
    pub fn is_empty(&self) -> bool {
        let tree = self
            .tree
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tree.is_empty()
    }

    /// The approximate occupied byte size.
    pub fn byte_size(&self) -> usize {
        self.byte_size.load(Ordering::Acquire)
    }

    /// A full ascending snapshot of the memtable's current contents.
    ///
    /// Used by the coordinator's flush and close paths, which need an
    /// owned, already-sorted entry stream to hand to [`crate::sstable::writer::SSTableWriter`].
    pub fn snapshot(&self) -> Vec<Entry> {
        let tree = self
            .tree
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tree.values().cloned().collect()
    }

    /// Builds a half-open `[from, to)` range cursor over a snapshot of the
    /// memtable's current contents, carrying priority
    /// `MAX_PRIORITY - priority_reduction`: the active memtable uses
    /// reduction `0`, the flushing memtable uses `1`.
    pub fn iterator(
        &self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
        priority_reduction: u64,
    ) -> MemTablePointerIterator {
        let tree = self
            .tree
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries: Vec<Entry> = tree
            .iter()
            .filter(|(k, _)| key_order::in_range(k, from, to))
            .map(|(_, v)| v.clone())
            .collect();
        MemTablePointerIterator {
            entries,
            pos: 0,
            priority: MAX_PRIORITY - priority_reduction,
        }
    }
}

/// A [`PointerIterator`] over a point-in-time snapshot of a memtable's
/// `[from, to)` range.
///
/// Snapshotting at construction time (rather than holding the memtable's
/// lock across the merge) means a concurrent `upsert` never blocks or is
/// blocked by an in-flight scan — exactly the "long-running scan never
/// blocks a concurrent upsert" guarantee the coordinator's locking
/// discipline relies on (see `crate::coordinator`).
pub struct MemTablePointerIterator {
    entries: Vec<Entry>,
    pos: usize,
    priority: u64,
}

impl PointerIterator for MemTablePointerIterator {
    fn has_next(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn peek_key(&self) -> &[u8] {
        &self.entries[self.pos].key
    }

    fn is_on_tombstone(&self) -> bool {
        self.entries[self.pos].is_tombstone()
    }

    fn shift(&mut self) -> Result<(), crate::error::StoreError> {
        if self.pos >= self.entries.len() {
            return Err(crate::error::StoreError::PreconditionViolation(
                "shift() called on an exhausted memtable cursor".into(),
            ));
        }
        self.pos += 1;
        Ok(())
    }

    fn next(&mut self) -> Result<Entry, crate::error::StoreError> {
        if self.pos >= self.entries.len() {
            return Err(crate::error::StoreError::PreconditionViolation(
                "next() called on an exhausted memtable cursor".into(),
            ));
        }
        let e = self.entries[self.pos].clone();
        self.pos += 1;
        Ok(e)
    }

    fn priority(&self) -> u64 {
        self.priority
    }
}
