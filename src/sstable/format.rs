//! The on-disk entry codec shared by the writer and reader, and the file
//! naming/path helpers for a generation's three-file triple.
//!
//! Logical entry layout: `keySize:u64 | keyBytes | valueSize:i64 |
//! valueBytes?`, `valueSize == -1` denoting a tombstone. All integers
//! little-endian, unaligned.

use std::path::{Path, PathBuf};

use crate::encoding::{Decode, Encode};
use crate::entry::{Entry, Value};
use crate::sstable::SSTableError;

/// The `valueSize` sentinel denoting a tombstone.
pub const TOMBSTONE_VALUE_SIZE: i64 = -1;

/// Appends the on-disk encoding of `entry` to `out`.
pub fn encode_entry(entry: &Entry, out: &mut Vec<u8>) {
    (entry.key.len() as u64).encode_to(out);
    out.extend_from_slice(&entry.key);
    match &entry.value {
        Value::Present(bytes) => {
            (bytes.len() as i64).encode_to(out);
            out.extend_from_slice(bytes);
        }
        Value::Tombstone => {
            TOMBSTONE_VALUE_SIZE.encode_to(out);
        }
    }
}

/// Decodes one entry from a flat, fully-contiguous byte slice (the
/// uncompressed layout's data file view). Returns `(entry, bytes_consumed)`.
pub fn decode_entry(buf: &[u8]) -> Result<(Entry, usize), SSTableError> {
    let (key_size, mut offset) = u64::decode_from(buf)?;
    let key_size = key_size as usize;
    if buf.len() < offset + key_size {
        return Err(SSTableError::Corrupt(format!(
            "entry key of size {key_size} runs past end of buffer"
        )));
    }
    let key = buf[offset..offset + key_size].to_vec();
    offset += key_size;

    let (value_size, consumed) = i64::decode_from(&buf[offset..])?;
    offset += consumed;

    let value = if value_size == TOMBSTONE_VALUE_SIZE {
        Value::Tombstone
    } else {
        let value_size = value_size as usize;
        if buf.len() < offset + value_size {
            return Err(SSTableError::Corrupt(format!(
                "entry value of size {value_size} runs past end of buffer"
            )));
        }
        let value = buf[offset..offset + value_size].to_vec();
        offset += value_size;
        Value::Present(value)
    };

    Ok((Entry { key, value }, offset))
}

/// The three file paths making up one generation's SSTable triple.
#[derive(Debug, Clone)]
pub struct SSTablePaths {
    pub data: PathBuf,
    pub index: PathBuf,
    pub compression_info: PathBuf,
}

impl SSTablePaths {
    /// The final (non-temporary) paths for `generation` inside `dir`.
    pub fn for_generation(dir: &Path, generation: u64) -> Self {
        Self {
            data: dir.join(format!("sstable_{generation}.data")),
            index: dir.join(format!("sstable_{generation}.index")),
            compression_info: dir.join(format!("sstable_{generation}.compressionInfo")),
        }
    }

    /// The paths compaction stages its output under before the atomic
    /// rename to a real generation.
    pub fn compacted_staging(dir: &Path) -> Self {
        Self {
            data: dir.join("compacted_tmp.data"),
            index: dir.join("compacted_tmp.index"),
            compression_info: dir.join("compacted_tmp.compressionInfo"),
        }
    }

    pub fn all_exist(&self) -> bool {
        self.data.is_file() && self.index.is_file() && self.compression_info.is_file()
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        path.with_file_name(name)
    }

    /// The `.tmp`-suffixed sibling paths the writer stages content under
    /// before syncing and renaming into place.
    pub fn tmp(&self) -> Self {
        Self {
            data: Self::with_suffix(&self.data, ".tmp"),
            index: Self::with_suffix(&self.index, ".tmp"),
            compression_info: Self::with_suffix(&self.compression_info, ".tmp"),
        }
    }
}
