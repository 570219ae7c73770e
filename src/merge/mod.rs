//! The N-way merge iterator and its tombstone-filtering adapter.
//!
//! [`PointerIterator`] is the uniform cursor abstraction over a memtable or
//! an SSTable: [`MergeIterator`] drives a priority-queue merge over any mix
//! of them without caring which kind of source it holds. [`TombstoneFilter`]
//! wraps a `MergeIterator` to hide deletion markers from user-facing reads
//! and from compaction output.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::entry::Entry;
use crate::error::StoreError;
use crate::key_order;

/// The priority of the active memtable (the highest in the system). Other
/// sources subtract a reduction from this: the flushing memtable uses
/// `MAX_PRIORITY - 1`; SSTables use their generation number directly, which
/// is always far below `MAX_PRIORITY - 1` in practice.
pub const MAX_PRIORITY: u64 = u64::MAX;

/// A stateful cursor positioned on an entry, or exhausted.
///
/// Implementors are the memtable's range cursor and the SSTable's range
/// cursor; [`MergeIterator`] treats every source polymorphically through
/// this trait, boxed as `Box<dyn PointerIterator>`.
///
/// `priority` breaks ties when two sources expose the same key: the source
/// with the larger `priority` wins. The active memtable has the highest
/// priority, the flushing memtable the next, then SSTables in descending
/// generation order (see `crate::coordinator`).
pub trait PointerIterator {
    /// `true` if the cursor is positioned on an entry.
    fn has_next(&self) -> bool;

    /// The key the cursor is positioned on, without materializing the
    /// value. Precondition: `has_next()`.
    fn peek_key(&self) -> &[u8];

    /// `true` if the current entry is a tombstone.
    fn is_on_tombstone(&self) -> bool;

    /// Advances past the current entry without materializing its value.
    /// Precondition: `has_next()`.
    fn shift(&mut self) -> Result<(), StoreError>;

    /// Materializes the current entry and advances past it.
    /// Precondition: `has_next()`.
    fn next(&mut self) -> Result<Entry, StoreError>;

    /// This source's priority in the merge (larger wins on key ties).
    fn priority(&self) -> u64;
}

/// The composite comparator driving the merge: ascending by current key,
/// descending by priority on a tie (so the authoritative value sorts to
/// the head of the min-heap).
fn compare_pointers(a: &dyn PointerIterator, b: &dyn PointerIterator) -> Ordering {
    match key_order::compare(a.peek_key(), b.peek_key()) {
        Ordering::Equal => b.priority().cmp(&a.priority()),
        other => other,
    }
}

struct HeapEntry {
    source: Box<dyn PointerIterator>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        compare_pointers(self.source.as_ref(), other.source.as_ref()) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key (and, on a
        // tie, the highest priority) pops first.
        compare_pointers(self.source.as_ref(), other.source.as_ref()).reverse()
    }
}

/// A priority queue over [`PointerIterator`] sources producing a
/// deduplicated ascending stream: when two sources agree on a key, only
/// the highest-priority source's value survives; the rest are discarded
/// without being materialized.
pub struct MergeIterator {
    heap: BinaryHeap<HeapEntry>,
}

impl MergeIterator {
    /// Builds a merge over `sources`. Sources already exhausted (empty
    /// memtables, empty-range SSTable cursors) are dropped immediately.
    pub fn new(sources: Vec<Box<dyn PointerIterator>>) -> Self {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for source in sources {
            if source.has_next() {
                heap.push(HeapEntry { source });
            }
        }
        Self { heap }
    }

    /// `true` if every source is exhausted.
    pub fn has_next(&self) -> bool {
        !self.heap.is_empty()
    }

    /// Produces the next deduplicated entry in ascending key order, or
    /// `None` when every source is exhausted.
    ///
    /// Algorithm: pop the head, drain and discard lower-priority
    /// duplicates sharing its key, materialize the head, then reinsert it
    /// if it still has entries.
    pub fn next(&mut self) -> Result<Option<Entry>, StoreError> {
        let Some(HeapEntry { source: mut head }) = self.heap.pop() else {
            return Ok(None);
        };

        let winning_key_len = head.peek_key().len();
        let mut winning_key = Vec::with_capacity(winning_key_len);
        winning_key.extend_from_slice(head.peek_key());

        while let Some(top) = self.heap.peek() {
            if top.source.peek_key() != winning_key.as_slice() {
                break;
            }
            // Safe to pop now: it is a confirmed lower-priority duplicate.
            let HeapEntry { source: mut dup } = match self.heap.pop() {
                Some(e) => e,
                None => break,
            };
            dup.shift()?;
            if dup.has_next() {
                self.heap.push(HeapEntry { source: dup });
            }
        }

        let entry = head.next()?;
        if head.has_next() {
            self.heap.push(HeapEntry { source: head });
        }
        Ok(Some(entry))
    }
}

impl Iterator for MergeIterator {
    type Item = Result<Entry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        MergeIterator::next(self).transpose()
    }
}

/// Wraps a [`MergeIterator`] to hide tombstones from the caller.
///
/// Used for user-facing range reads and for compaction output. Compaction
/// drops tombstones unconditionally because it subsumes every table: no
/// older layer survives for the tombstone to keep shadowing.
pub struct TombstoneFilter {
    inner: MergeIterator,
}

impl TombstoneFilter {
    pub fn new(inner: MergeIterator) -> Self {
        Self { inner }
    }
}

impl Iterator for TombstoneFilter {
    type Item = Result<Entry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next() {
                Ok(Some(entry)) => {
                    if entry.is_tombstone() {
                        continue;
                    }
                    return Some(Ok(entry));
                }
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
