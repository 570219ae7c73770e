use crate::entry::Entry;
use crate::error::StoreError;
use crate::merge::{MergeIterator, PointerIterator, TombstoneFilter};

/// An in-memory `PointerIterator` over a `Vec<Entry>`, used to drive the
/// merge/tombstone-filter logic in isolation from the memtable/SSTable
/// implementations.
struct VecPointer {
    entries: Vec<Entry>,
    pos: usize,
    priority: u64,
}

impl VecPointer {
    fn new(entries: Vec<Entry>, priority: u64) -> Self {
        Self {
            entries,
            pos: 0,
            priority,
        }
    }
}

impl PointerIterator for VecPointer {
    fn has_next(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn peek_key(&self) -> &[u8] {
        &self.entries[self.pos].key
    }

    fn is_on_tombstone(&self) -> bool {
        self.entries[self.pos].is_tombstone()
    }

    fn shift(&mut self) -> Result<(), StoreError> {
        self.pos += 1;
        Ok(())
    }

    fn next(&mut self) -> Result<Entry, StoreError> {
        let e = self.entries[self.pos].clone();
        self.pos += 1;
        Ok(e)
    }

    fn priority(&self) -> u64 {
        self.priority
    }
}

fn boxed(entries: Vec<Entry>, priority: u64) -> Box<dyn PointerIterator> {
    Box::new(VecPointer::new(entries, priority))
}

#[test]
fn merges_disjoint_sources_in_ascending_order() {
    let a = boxed(vec![Entry::put("a", "1"), Entry::put("c", "3")], 0);
    let b = boxed(vec![Entry::put("b", "2")], 1);
    let mut merge = MergeIterator::new(vec![a, b]);

    let out: Vec<Entry> = std::iter::from_fn(|| merge.next().transpose())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        out,
        vec![
            Entry::put("a", "1"),
            Entry::put("b", "2"),
            Entry::put("c", "3"),
        ]
    );
}

#[test]
fn higher_priority_source_wins_on_key_tie() {
    // Source 0 (lower priority) has a stale value for "a"; source 1 (higher
    // priority) has the authoritative one. Only the winner is materialized.
    let stale = boxed(vec![Entry::put("a", "old")], 0);
    let fresh = boxed(vec![Entry::put("a", "new")], 1);
    let mut merge = MergeIterator::new(vec![stale, fresh]);

    let first = merge.next().unwrap().unwrap();
    assert_eq!(first, Entry::put("a", "new"));
    assert!(merge.next().unwrap().is_none());
}

#[test]
fn tombstone_filter_hides_deletions() {
    let memtable = boxed(vec![Entry::tombstone("a"), Entry::put("b", "2")], 1);
    let sstable = boxed(vec![Entry::put("a", "1")], 0);
    let merge = MergeIterator::new(vec![memtable, sstable]);
    let filtered: Vec<Entry> = TombstoneFilter::new(merge)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(filtered, vec![Entry::put("b", "2")]);
}

#[test]
fn empty_sources_are_dropped_immediately() {
    let empty = boxed(vec![], 5);
    let nonempty = boxed(vec![Entry::put("k", "v")], 0);
    let mut merge = MergeIterator::new(vec![empty, nonempty]);
    assert!(merge.has_next());
    assert_eq!(merge.next().unwrap().unwrap(), Entry::put("k", "v"));
    assert!(!merge.has_next());
}

#[test]
fn three_way_tie_keeps_only_the_top_priority_value() {
    let low = boxed(vec![Entry::put("k", "lowest")], 0);
    let mid = boxed(vec![Entry::put("k", "middle")], 1);
    let high = boxed(vec![Entry::put("k", "highest")], 2);
    let mut merge = MergeIterator::new(vec![low, mid, high]);
    assert_eq!(merge.next().unwrap().unwrap(), Entry::put("k", "highest"));
    assert!(merge.next().unwrap().is_none());
}
