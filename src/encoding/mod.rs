//! Deterministic binary encoding for the SSTable on-disk format.
//!
//! This module provides the [`Encode`]/[`Decode`] traits and primitive
//! implementations for exactly the field widths the on-disk format requires:
//! `u8` (header/flag bytes), `u32` (block offsets/counts), `u64` (key sizes,
//! entry counts, absolute data offsets), and `i64` (value sizes, where `-1`
//! denotes a tombstone). All multi-byte integers are little-endian,
//! unaligned.
//!
//! # Zero-panic guarantee
//!
//! No function in this module uses `unwrap()`, `expect()`, or any other
//! panicking path; all errors are propagated via [`EncodingError`].

#[cfg(test)]
mod tests;

use thiserror::Error;

/// Errors produced during encoding or decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },
}

/// Serialize `self` into a byte buffer.
pub trait Encode {
    /// Append the encoded representation of `self` to `buf`.
    fn encode_to(&self, buf: &mut Vec<u8>);
}

/// Deserialize a value from a byte slice.
///
/// Returns `(value, bytes_consumed)` on success so callers can advance a
/// cursor through a buffer containing multiple encoded fields.
pub trait Decode: Sized {
    /// Decode one value starting at `buf[0]`.
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError>;
}

/// Encode a value into a freshly-allocated `Vec<u8>`.
pub fn encode_to_vec<T: Encode>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode_to(&mut buf);
    buf
}

/// Decode a value from the beginning of `buf`.
pub fn decode_from_slice<T: Decode>(buf: &[u8]) -> Result<(T, usize), EncodingError> {
    T::decode_from(buf)
}

/// Verify that `buf` has at least `needed` bytes, returning
/// [`EncodingError::UnexpectedEof`] if not.
#[inline]
fn require(buf: &[u8], needed: usize) -> Result<(), EncodingError> {
    if buf.len() < needed {
        Err(EncodingError::UnexpectedEof {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

impl Encode for u8 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }
}

impl Decode for u8 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 1)?;
        Ok((buf[0], 1))
    }
}

impl Encode for u32 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u32 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&buf[..4]);
        Ok((u32::from_le_bytes(arr), 4))
    }
}

impl Encode for u64 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&buf[..8]);
        Ok((u64::from_le_bytes(arr), 8))
    }
}

impl Encode for i64 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for i64 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&buf[..8]);
        Ok((i64::from_le_bytes(arr), 8))
    }
}
