use crate::entry::Entry;
use crate::memtable::MemTable;
use crate::merge::{MAX_PRIORITY, PointerIterator};

#[test]
fn active_priority_reduction_zero_is_max_priority() {
    let mt = MemTable::new(None);
    mt.upsert(Entry::put("a", "1")).unwrap();
    let cursor = mt.iterator(None, None, 0);
    assert_eq!(cursor.priority(), MAX_PRIORITY);
}

#[test]
fn flushing_priority_reduction_one_is_one_less() {
    let mt = MemTable::new(None);
    mt.upsert(Entry::put("a", "1")).unwrap();
    let cursor = mt.iterator(None, None, 1);
    assert_eq!(cursor.priority(), MAX_PRIORITY - 1);
}

#[test]
fn iterator_over_empty_memtable_has_no_next() {
    let mt = MemTable::new(None);
    let cursor = mt.iterator(None, None, 0);
    assert!(!cursor.has_next());
}

#[test]
fn iterator_materializes_tombstones_as_entries() {
    let mt = MemTable::new(None);
    mt.upsert(Entry::tombstone("a")).unwrap();
    let mut cursor = mt.iterator(None, None, 0);
    assert!(cursor.is_on_tombstone());
    let e = cursor.next().unwrap();
    assert!(e.is_tombstone());
}

#[test]
fn sentinel_threshold_never_rejects_or_overflows() {
    let mt = MemTable::new(None);
    for i in 0..500u32 {
        assert!(!mt.upsert(Entry::put(i.to_string(), vec![0u8; 256])).unwrap());
    }
}
