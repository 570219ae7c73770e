use std::fs;

use tempfile::TempDir;

use crate::entry::Entry;
use crate::sstable::SSTableReader;
use crate::sstable::format::SSTablePaths;
use crate::sstable::writer::{CompressionConfig, SSTableWriter};

#[test]
fn truncated_data_file_is_reported_as_corrupt() {
    let tmp = TempDir::new().unwrap();
    let paths = SSTablePaths::for_generation(tmp.path(), 0);
    SSTableWriter::write(
        vec![Entry::put("a", "1"), Entry::put("b", "2")].into_iter(),
        &paths,
        CompressionConfig::None,
    )
    .unwrap();

    // Truncate the data file so the second entry's bytes are gone.
    let data = fs::read(&paths.data).unwrap();
    fs::write(&paths.data, &data[..data.len() - 2]).unwrap();

    let reader = SSTableReader::open(&paths, 0).unwrap();
    // The index still claims two entries; reading past the truncated tail
    // must surface a corruption error, never a panic.
    assert!(reader.get(b"b").is_err());
}

#[test]
fn index_offset_past_end_of_data_file_is_reported_as_corrupt() {
    let tmp = TempDir::new().unwrap();
    let paths = SSTablePaths::for_generation(tmp.path(), 0);
    SSTableWriter::write(
        vec![Entry::put("a", "1"), Entry::put("b", "2")].into_iter(),
        &paths,
        CompressionConfig::None,
    )
    .unwrap();

    // Corrupt the second entry's offset (uncompressed index: hasNoTombstones:u8
    // | entriesSize:u64 | offset_1:u64 | offset_2:u64) to point far past the
    // end of the data file.
    let mut index = fs::read(&paths.index).unwrap();
    let second_offset_start = 1 + 8 + 8;
    index[second_offset_start..second_offset_start + 8]
        .copy_from_slice(&u64::MAX.to_le_bytes());
    fs::write(&paths.index, index).unwrap();

    let reader = SSTableReader::open(&paths, 0).unwrap();
    assert!(reader.get(b"b").is_err());
}

#[test]
fn unsupported_compression_algorithm_byte_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let paths = SSTablePaths::for_generation(tmp.path(), 0);
    SSTableWriter::write(
        vec![Entry::put("a", "1")].into_iter(),
        &paths,
        CompressionConfig::Lz4 {
            uncompressed_block_size: 16,
        },
    )
    .unwrap();

    let mut info = fs::read(&paths.compression_info).unwrap();
    info[1] = 99; // corrupt the algorithm byte
    fs::write(&paths.compression_info, info).unwrap();

    assert!(SSTableReader::open(&paths, 0).is_err());
}
