//! Serializes a sorted entry stream into one immutable SSTable.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use tracing::info;

use crate::compression::{BlockCompressor, Lz4Compressor};
use crate::encoding::Encode;
use crate::entry::Entry;
use crate::sstable::SSTableError;
use crate::sstable::format::{SSTablePaths, encode_entry};

/// Selects the SSTable's on-disk layout and, for the compressed layout,
/// its block compressor and block size.
#[derive(Debug, Clone, Copy)]
pub enum CompressionConfig {
    /// The uncompressed layout: raw entries, absolute offsets in the index.
    None,
    /// The compressed layout: LZ4-compressed fixed-size blocks.
    Lz4 { uncompressed_block_size: u32 },
}

/// Builds one immutable SSTable from a sorted entry stream.
pub struct SSTableWriter;

impl SSTableWriter {
    /// Writes `entries` (must already be in ascending key order) to the
    /// file triple named by `paths`, using the layout named by
    /// `compression`. On success all three files exist at their final
    /// names, synced. On any I/O failure, partially-written `.tmp` files
    /// are removed and the error propagates.
    pub fn write(
        entries: impl Iterator<Item = Entry>,
        paths: &SSTablePaths,
        compression: CompressionConfig,
    ) -> Result<(), SSTableError> {
        let tmp = paths.tmp();
        let result = match compression {
            CompressionConfig::None => Self::write_uncompressed(entries, &tmp),
            CompressionConfig::Lz4 {
                uncompressed_block_size,
            } => Self::write_compressed(entries, &tmp, uncompressed_block_size),
        };

        if result.is_err() {
            for p in [&tmp.data, &tmp.index, &tmp.compression_info] {
                let _ = fs::remove_file(p);
            }
            return result;
        }

        fs::rename(&tmp.data, &paths.data)?;
        fs::rename(&tmp.index, &paths.index)?;
        fs::rename(&tmp.compression_info, &paths.compression_info)?;
        Ok(())
    }

    fn write_uncompressed(
        entries: impl Iterator<Item = Entry>,
        tmp: &SSTablePaths,
    ) -> Result<(), SSTableError> {
        let data_file = File::create(&tmp.data)?;
        let mut data_writer = BufWriter::new(data_file);

        let mut offsets: Vec<u64> = Vec::new();
        let mut has_tombstone = false;
        let mut running_offset: u64 = 0;
        let mut entry_buf = Vec::new();

        for entry in entries {
            offsets.push(running_offset);
            has_tombstone |= entry.is_tombstone();
            entry_buf.clear();
            encode_entry(&entry, &mut entry_buf);
            data_writer.write_all(&entry_buf)?;
            running_offset += entry_buf.len() as u64;
        }
        data_writer.flush()?;
        data_writer.get_ref().sync_all()?;

        let mut index_buf = Vec::new();
        (!has_tombstone as u8).encode_to(&mut index_buf);
        (offsets.len() as u64).encode_to(&mut index_buf);
        for offset in &offsets {
            offset.encode_to(&mut index_buf);
        }
        fs::write(&tmp.index, &index_buf)?;
        File::open(&tmp.index)?.sync_all()?;

        fs::write(&tmp.compression_info, [0u8])?;
        File::open(&tmp.compression_info)?.sync_all()?;

        info!(entries = offsets.len(), "wrote uncompressed SSTable");
        Ok(())
    }

    fn write_compressed(
        entries: impl Iterator<Item = Entry>,
        tmp: &SSTablePaths,
        uncompressed_block_size: u32,
    ) -> Result<(), SSTableError> {
        let compressor = Lz4Compressor;
        let block_size = uncompressed_block_size as usize;

        let data_file = File::create(&tmp.data)?;
        let mut data_writer = BufWriter::new(data_file);

        let mut block_buffer: Vec<u8> = Vec::with_capacity(block_size);
        let mut block_offsets: Vec<u32> = Vec::new();
        let mut data_offset: u64 = 0;
        let mut block_count: u32 = 0;

        let mut index_entries: Vec<(u32, u32)> = Vec::new();
        let mut has_tombstone = false;
        let mut entries_size: u64 = 0;
        let mut entry_buf = Vec::new();

        let mut flush_block =
            |buffer: &mut Vec<u8>,
             writer: &mut BufWriter<File>,
             offsets: &mut Vec<u32>,
             offset: &mut u64,
             count: &mut u32|
             -> Result<(), SSTableError> {
                let compressed = compressor.compress(buffer);
                offsets.push((*offset) as u32);
                writer.write_all(&compressed)?;
                *offset += compressed.len() as u64;
                *count += 1;
                buffer.clear();
                Ok(())
            };

        for entry in entries {
            index_entries.push((block_count, block_buffer.len() as u32));
            has_tombstone |= entry.is_tombstone();
            entries_size += 1;

            entry_buf.clear();
            encode_entry(&entry, &mut entry_buf);
            let mut remaining: &[u8] = &entry_buf;
            while !remaining.is_empty() {
                let space = block_size - block_buffer.len();
                let take = space.min(remaining.len());
                block_buffer.extend_from_slice(&remaining[..take]);
                remaining = &remaining[take..];
                if block_buffer.len() == block_size {
                    flush_block(
                        &mut block_buffer,
                        &mut data_writer,
                        &mut block_offsets,
                        &mut data_offset,
                        &mut block_count,
                    )?;
                }
            }
        }

        // Tail block: whatever remains, even if empty.
        let tail_size = block_buffer.len() as u32;
        flush_block(
            &mut block_buffer,
            &mut data_writer,
            &mut block_offsets,
            &mut data_offset,
            &mut block_count,
        )?;

        data_writer.flush()?;
        data_writer.get_ref().sync_all()?;

        let mut index_buf = Vec::new();
        (!has_tombstone as u8).encode_to(&mut index_buf);
        entries_size.encode_to(&mut index_buf);
        for (block_number, byte_offset) in &index_entries {
            block_number.encode_to(&mut index_buf);
            byte_offset.encode_to(&mut index_buf);
        }
        fs::write(&tmp.index, &index_buf)?;
        File::open(&tmp.index)?.sync_all()?;

        let mut info_buf = Vec::new();
        1u8.encode_to(&mut info_buf); // isCompressed
        compressor.algorithm_id().encode_to(&mut info_buf);
        block_count.encode_to(&mut info_buf);
        uncompressed_block_size.encode_to(&mut info_buf);
        for offset in &block_offsets {
            offset.encode_to(&mut info_buf);
        }
        tail_size.encode_to(&mut info_buf);
        fs::write(&tmp.compression_info, &info_buf)?;
        File::open(&tmp.compression_info)?.sync_all()?;

        info!(
            entries = entries_size,
            blocks = block_count,
            "wrote compressed SSTable"
        );
        Ok(())
    }
}
