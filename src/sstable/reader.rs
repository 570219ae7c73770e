//! Opens one immutable SSTable for point lookups and range scans.

use std::cmp::Ordering;
use std::fs::{self, File};

use memmap2::Mmap;

use crate::compression::{BlockCompressor, compressor_for_algorithm};
use crate::encoding::Decode;
use crate::entry::Entry;
use crate::sstable::SSTableError;
use crate::sstable::format::{SSTablePaths, TOMBSTONE_VALUE_SIZE, decode_entry};

enum Layout {
    Uncompressed {
        /// Absolute byte offset into `data`, one per entry.
        offsets: Vec<u64>,
    },
    Compressed {
        compressor: Box<dyn BlockCompressor>,
        /// Uncompressed size of every block but the last.
        block_size: u32,
        /// Compressed byte offset into `data` where each block starts.
        block_offsets: Vec<u32>,
        /// Uncompressed size of the final (tail) block.
        tail_size: u32,
        /// `(block_number, byte_offset_within_uncompressed_block)`, one per entry.
        index: Vec<(u32, u32)>,
    },
}

/// A read-only handle onto one generation's on-disk SSTable triple.
///
/// The data file is memory-mapped; the (small, control-sized) index and
/// compression-info files are parsed eagerly into owned vectors so lookups
/// never re-parse them.
pub struct SSTableReader {
    generation: u64,
    data: Mmap,
    has_no_tombstones: bool,
    entries: u64,
    layout: Layout,
}

impl SSTableReader {
    /// Opens the SSTable named by `paths`, whose merge priority is `generation`.
    pub fn open(paths: &SSTablePaths, generation: u64) -> Result<Self, SSTableError> {
        let data_file = File::open(&paths.data)?;
        // SAFETY: the data file is never mutated once its triple is renamed
        // into place; readers only ever see complete, immutable tables.
        let data = unsafe { Mmap::map(&data_file)? };

        let index_bytes = fs::read(&paths.index)?;
        let mut pos = 0usize;
        let (has_no_tombstones_flag, n) = u8::decode_from(&index_bytes[pos..])?;
        pos += n;
        let (entries, n) = u64::decode_from(&index_bytes[pos..])?;
        pos += n;

        let info_bytes = fs::read(&paths.compression_info)?;
        let (is_compressed, n) = u8::decode_from(&info_bytes[0..])?;
        let mut info_pos = n;

        let layout = if is_compressed == 0 {
            let mut offsets = Vec::with_capacity(entries as usize);
            for _ in 0..entries {
                let (offset, n) = u64::decode_from(&index_bytes[pos..])?;
                pos += n;
                offsets.push(offset);
            }
            Layout::Uncompressed { offsets }
        } else {
            let (algorithm, n) = u8::decode_from(&info_bytes[info_pos..])?;
            info_pos += n;
            let compressor = compressor_for_algorithm(algorithm)?;

            let (block_count, n) = u32::decode_from(&info_bytes[info_pos..])?;
            info_pos += n;
            let (block_size, n) = u32::decode_from(&info_bytes[info_pos..])?;
            info_pos += n;

            let mut block_offsets = Vec::with_capacity(block_count as usize);
            for _ in 0..block_count {
                let (offset, n) = u32::decode_from(&info_bytes[info_pos..])?;
                info_pos += n;
                block_offsets.push(offset);
            }
            let (tail_size, _) = u32::decode_from(&info_bytes[info_pos..])?;

            let mut index = Vec::with_capacity(entries as usize);
            for _ in 0..entries {
                let (block_number, n) = u32::decode_from(&index_bytes[pos..])?;
                pos += n;
                let (byte_offset, n) = u32::decode_from(&index_bytes[pos..])?;
                pos += n;
                index.push((block_number, byte_offset));
            }

            Layout::Compressed {
                compressor,
                block_size,
                block_offsets,
                tail_size,
                index,
            }
        };

        Ok(Self {
            generation,
            data,
            has_no_tombstones: has_no_tombstones_flag != 0,
            entries,
            layout,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cheap tombstone-free hint: if `true`, a merge or compaction pass may
    /// skip scanning this table purely to discard tombstones.
    pub fn has_no_tombstones(&self) -> bool {
        self.has_no_tombstones
    }

    pub fn len(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    fn block_len(&self, block_offsets: &[u32], block_size: u32, tail_size: u32, block: u32) -> u32 {
        if block as usize + 1 == block_offsets.len() {
            tail_size
        } else {
            block_size
        }
    }

    fn decompress_block(&self, block: u32) -> Result<Vec<u8>, SSTableError> {
        let Layout::Compressed {
            compressor,
            block_size,
            block_offsets,
            tail_size,
            ..
        } = &self.layout
        else {
            unreachable!("decompress_block called on an uncompressed table")
        };
        let start = block_offsets[block as usize] as usize;
        let end = block_offsets
            .get(block as usize + 1)
            .map(|&o| o as usize)
            .unwrap_or(self.data.len());
        let expected = self.block_len(block_offsets, *block_size, *tail_size, block) as usize;
        Ok(compressor.decompress(&self.data[start..end], expected)?)
    }

    /// Reads exactly `len` logical bytes starting at `(block, offset)`,
    /// stitching across block boundaries as needed, and returns the
    /// resulting bytes plus the position immediately following them.
    fn read_span(&self, mut block: u32, mut offset: u32, len: usize) -> Result<(Vec<u8>, u32, u32), SSTableError> {
        let mut out = Vec::with_capacity(len);
        let mut remaining = len;
        while remaining > 0 {
            let bytes = self.decompress_block(block)?;
            let avail = bytes.len() as u32 - offset;
            let take = avail.min(remaining as u32);
            out.extend_from_slice(&bytes[offset as usize..(offset + take) as usize]);
            remaining -= take as usize;
            offset += take;
            if offset == bytes.len() as u32 {
                block += 1;
                offset = 0;
            }
        }
        Ok((out, block, offset))
    }

    /// Advances `len` logical bytes from `(block, offset)` without
    /// decompressing any block whose content isn't otherwise needed — block
    /// sizes are fixed, so the destination position is pure arithmetic.
    fn skip_span(&self, block: u32, offset: u32, len: usize) -> (u32, u32) {
        let Layout::Compressed {
            block_size,
            block_offsets,
            tail_size,
            ..
        } = &self.layout
        else {
            unreachable!("skip_span called on an uncompressed table")
        };
        let mut block = block;
        let mut offset = offset;
        let mut remaining = len as u32;
        while remaining > 0 {
            let block_len = self.block_len(block_offsets, *block_size, *tail_size, block);
            let avail = block_len - offset;
            if remaining <= avail {
                offset += remaining;
                remaining = 0;
                if offset == block_len {
                    block += 1;
                    offset = 0;
                }
            } else {
                remaining -= avail;
                block += 1;
                offset = 0;
            }
        }
        (block, offset)
    }

    /// The data file's bytes starting at `offset`, or `Corrupt` if `offset`
    /// (taken verbatim from the on-disk index) runs past the end of the
    /// mapped data file.
    fn data_from(&self, offset: u64) -> Result<&[u8], SSTableError> {
        self.data.get(offset as usize..).ok_or_else(|| {
            SSTableError::Corrupt(format!(
                "index offset {offset} runs past end of data file ({} bytes)",
                self.data.len()
            ))
        })
    }

    pub fn key_at(&self, i: u64) -> Result<Vec<u8>, SSTableError> {
        Ok(self.key_and_tombstone_at(i)?.0)
    }

    /// The key and tombstone flag at entry `i`, decoded without paying for
    /// value decompression when the value's bytes straddle further blocks.
    pub fn key_and_tombstone_at(&self, i: u64) -> Result<(Vec<u8>, bool), SSTableError> {
        match &self.layout {
            Layout::Uncompressed { offsets } => {
                let offset = offsets[i as usize];
                let (entry, _) = decode_entry(self.data_from(offset)?)?;
                Ok((entry.key, entry.is_tombstone()))
            }
            Layout::Compressed { index, .. } => {
                let (block, offset) = index[i as usize];
                let (key_size_buf, b1, o1) = self.read_span(block, offset, 8)?;
                let (key_size, _) = u64::decode_from(&key_size_buf)?;
                let (key, b2, o2) = self.read_span(b1, o1, key_size as usize)?;
                let (value_size_buf, _, _) = self.read_span(b2, o2, 8)?;
                let (value_size, _) = i64::decode_from(&value_size_buf)?;
                Ok((key, value_size == TOMBSTONE_VALUE_SIZE))
            }
        }
    }

    pub fn entry_at(&self, i: u64) -> Result<Entry, SSTableError> {
        match &self.layout {
            Layout::Uncompressed { offsets } => {
                let offset = offsets[i as usize];
                let (entry, _) = decode_entry(self.data_from(offset)?)?;
                Ok(entry)
            }
            Layout::Compressed { index, .. } => {
                let (block, offset) = index[i as usize];
                let (key_size_buf, b1, o1) = self.read_span(block, offset, 8)?;
                let (key_size, _) = u64::decode_from(&key_size_buf)?;
                let (key, b2, o2) = self.read_span(b1, o1, key_size as usize)?;
                let (value_size_buf, b3, o3) = self.read_span(b2, o2, 8)?;
                let (value_size, _) = i64::decode_from(&value_size_buf)?;
                let value = if value_size == TOMBSTONE_VALUE_SIZE {
                    crate::entry::Value::Tombstone
                } else {
                    let (bytes, _, _) = self.read_span(b3, o3, value_size as usize)?;
                    crate::entry::Value::Present(bytes)
                };
                Ok(Entry { key, value })
            }
        }
    }

    /// The index of the leftmost entry whose key is `>= key`, or
    /// [`Self::len`] if every entry sorts below `key`. Never materializes
    /// any value.
    pub fn lower_bound_index(&self, key: &[u8]) -> Result<u64, SSTableError> {
        let mut lo = 0u64;
        let mut hi = self.entries;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_key = self.key_at(mid)?;
            if mid_key.as_slice() < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>, SSTableError> {
        if self.entries == 0 {
            return Ok(None);
        }
        let mut lo = 0u64;
        let mut hi = self.entries;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_key = self.key_at(mid)?;
            match mid_key.as_slice().cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Some(self.entry_at(mid)?)),
            }
        }
        Ok(None)
    }
}
