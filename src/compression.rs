//! The `BlockCompressor` capability the SSTable writer/reader consume.
//!
//! Deliberately pluggable: the core only depends on the `{compress,
//! decompress}` capability set, never on a concrete algorithm. Two variants
//! ship with this crate — [`IdentityCompressor`] (the uncompressed layout
//! uses no compressor at all, but the trait is also handed a no-op impl for
//! symmetry in tests) and [`Lz4Compressor`] (the only compressor the
//! compressed layout actually writes, `algorithm:u8 = 1`).

use thiserror::Error;

/// Errors raised while compressing or decompressing a block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// The compressed bytes could not be decoded, or decoded to a length
    /// other than the caller's expected uncompressed size.
    #[error("block decompression failed: {0}")]
    Corrupt(String),

    /// The compression-info file named an `algorithm` byte this crate does
    /// not implement.
    #[error("unsupported compression algorithm: {0}")]
    UnsupportedAlgorithm(u8),
}

/// A pluggable block compressor.
///
/// `decompress` is told the exact uncompressed length it must produce
/// (`uncompressedBlockSize` for all but the tail block, `tailSize` for the
/// tail) so implementations that don't self-describe length can still be
/// used.
pub trait BlockCompressor: Send + Sync {
    /// The `algorithm:u8` value written to the compression-info header.
    fn algorithm_id(&self) -> u8;

    /// Compress one block's worth of bytes.
    fn compress(&self, block: &[u8]) -> Vec<u8>;

    /// Decompress a block, expecting exactly `expected_len` output bytes.
    fn decompress(&self, block: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressionError>;
}

/// A no-op compressor: `compress`/`decompress` copy bytes unchanged.
///
/// Used by tests exercising `BlockCompressor` generically; the crate's
/// uncompressed SSTable layout does not go through this trait at all (it
/// has no blocks), so this never appears as `algorithm:u8` on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCompressor;

impl BlockCompressor for IdentityCompressor {
    fn algorithm_id(&self) -> u8 {
        0
    }

    fn compress(&self, block: &[u8]) -> Vec<u8> {
        block.to_vec()
    }

    fn decompress(&self, block: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressionError> {
        if block.len() != expected_len {
            return Err(CompressionError::Corrupt(format!(
                "identity block length {} != expected {}",
                block.len(),
                expected_len
            )));
        }
        Ok(block.to_vec())
    }
}

/// LZ4 block compression (`algorithm:u8 = 1`), the only compressor the
/// compressed SSTable layout actually writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

impl BlockCompressor for Lz4Compressor {
    fn algorithm_id(&self) -> u8 {
        1
    }

    fn compress(&self, block: &[u8]) -> Vec<u8> {
        lz4_flex::block::compress(block)
    }

    fn decompress(&self, block: &[u8], expected_len: usize) -> Result<Vec<u8>, CompressionError> {
        lz4_flex::block::decompress(block, expected_len)
            .map_err(|e| CompressionError::Corrupt(e.to_string()))
    }
}

/// Constructs the compressor named by an on-disk `algorithm:u8` value.
pub fn compressor_for_algorithm(id: u8) -> Result<Box<dyn BlockCompressor>, CompressionError> {
    match id {
        1 => Ok(Box::new(Lz4Compressor)),
        other => Err(CompressionError::UnsupportedAlgorithm(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_roundtrips() {
        let c = IdentityCompressor;
        let data = b"hello world".to_vec();
        let compressed = c.compress(&data);
        let decompressed = c.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn lz4_roundtrips() {
        let c = Lz4Compressor;
        let data = vec![42u8; 4096];
        let compressed = c.compress(&data);
        assert!(compressed.len() < data.len());
        let decompressed = c.decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn lz4_rejects_wrong_expected_len() {
        let c = Lz4Compressor;
        let data = vec![7u8; 256];
        let compressed = c.compress(&data);
        assert!(c.decompress(&compressed, 10).is_err());
    }

    #[test]
    fn unsupported_algorithm_rejected() {
        assert!(matches!(
            compressor_for_algorithm(99),
            Err(CompressionError::UnsupportedAlgorithm(99))
        ));
    }

    #[test]
    fn algorithm_for_1_is_lz4() {
        let c = compressor_for_algorithm(1).unwrap();
        assert_eq!(c.algorithm_id(), 1);
    }
}
