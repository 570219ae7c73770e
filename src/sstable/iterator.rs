//! The [`crate::merge::PointerIterator`] implementation over an
//! [`SSTableReader`]: a range cursor that drives the merge
//! without paying for value decompression on losing candidates.

use std::sync::Arc;

use crate::entry::Entry;
use crate::error::StoreError;
use crate::merge::PointerIterator;
use crate::sstable::reader::SSTableReader;

/// A `[from, to)` range cursor over one SSTable, carrying the table's
/// generation as its merge priority.
///
/// The cursor advances by index; `peek_key` decodes only the key (and the
/// tombstone flag, for `is_on_tombstone`) of the current slot, never the
/// value, so a duplicate shadowed by a higher-priority source is never
/// paid for beyond that.
pub struct SSTablePointerIterator {
    reader: Arc<SSTableReader>,
    pos: u64,
    end: u64,
    to_exclusive: Option<Vec<u8>>,
    cached: Option<(Vec<u8>, bool)>,
}

impl SSTablePointerIterator {
    /// Builds a cursor over `reader`'s `[from, to)` range. `from` absent
    /// starts at slot 0; `to` absent runs to the end of the table.
    pub fn new(
        reader: Arc<SSTableReader>,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
    ) -> Result<Self, StoreError> {
        let start = match from {
            Some(key) => reader.lower_bound_index(key)?,
            None => 0,
        };
        let end = reader.len();
        let mut it = Self {
            reader,
            pos: start,
            end,
            to_exclusive: to.map(|k| k.to_vec()),
            cached: None,
        };
        it.fill_cache()?;
        Ok(it)
    }

    fn fill_cache(&mut self) -> Result<(), StoreError> {
        self.cached = if self.pos < self.end {
            let (key, is_tombstone) = self.reader.key_and_tombstone_at(self.pos)?;
            if self
                .to_exclusive
                .as_deref()
                .is_some_and(|to| key.as_slice() >= to)
            {
                None
            } else {
                Some((key, is_tombstone))
            }
        } else {
            None
        };
        Ok(())
    }
}

impl PointerIterator for SSTablePointerIterator {
    fn has_next(&self) -> bool {
        self.cached.is_some()
    }

    fn peek_key(&self) -> &[u8] {
        &self
            .cached
            .as_ref()
            .expect("has_next() must be checked before peek_key()")
            .0
    }

    fn is_on_tombstone(&self) -> bool {
        self.cached
            .as_ref()
            .expect("has_next() must be checked before is_on_tombstone()")
            .1
    }

    fn shift(&mut self) -> Result<(), StoreError> {
        if self.cached.is_none() {
            return Err(StoreError::PreconditionViolation(
                "shift() called on an exhausted SSTable cursor".into(),
            ));
        }
        self.pos += 1;
        self.fill_cache()
    }

    fn next(&mut self) -> Result<Entry, StoreError> {
        if self.cached.is_none() {
            return Err(StoreError::PreconditionViolation(
                "next() called on an exhausted SSTable cursor".into(),
            ));
        }
        let entry = self.reader.entry_at(self.pos)?;
        self.pos += 1;
        self.fill_cache()?;
        Ok(entry)
    }

    fn priority(&self) -> u64 {
        self.reader.generation()
    }
}
