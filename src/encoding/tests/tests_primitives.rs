//! Round-trip tests for the primitive integer encodings the SSTable format
//! actually uses: `u8`, `u32`, `u64`, `i64`.

use crate::encoding::*;

#[test]
fn roundtrip_u8() {
    let val: u8 = 0xAB;
    let bytes = encode_to_vec(&val);
    assert_eq!(bytes, [0xAB]);
    let (decoded, consumed) = decode_from_slice::<u8>(&bytes).unwrap();
    assert_eq!(decoded, val);
    assert_eq!(consumed, 1);
}

#[test]
fn roundtrip_u32() {
    let val: u32 = 0xDEAD_BEEF;
    let bytes = encode_to_vec(&val);
    assert_eq!(bytes, [0xEF, 0xBE, 0xAD, 0xDE]);
    let (decoded, consumed) = decode_from_slice::<u32>(&bytes).unwrap();
    assert_eq!(decoded, val);
    assert_eq!(consumed, 4);
}

#[test]
fn roundtrip_u64() {
    let val: u64 = 0x0123_4567_89AB_CDEF;
    let bytes = encode_to_vec(&val);
    assert_eq!(bytes.len(), 8);
    let (decoded, consumed) = decode_from_slice::<u64>(&bytes).unwrap();
    assert_eq!(decoded, val);
    assert_eq!(consumed, 8);
}

#[test]
fn roundtrip_i64_negative_one_is_tombstone_marker() {
    let val: i64 = -1;
    let bytes = encode_to_vec(&val);
    assert_eq!(bytes, [0xFF; 8]);
    let (decoded, consumed) = decode_from_slice::<i64>(&bytes).unwrap();
    assert_eq!(decoded, val);
    assert_eq!(consumed, 8);
}

#[test]
fn roundtrip_i64_positive() {
    let val: i64 = 123_456_789;
    let bytes = encode_to_vec(&val);
    let (decoded, _) = decode_from_slice::<i64>(&bytes).unwrap();
    assert_eq!(decoded, val);
}

#[test]
fn decode_sequential_fields_from_one_buffer() {
    let mut buf = Vec::new();
    7u64.encode_to(&mut buf);
    (-1i64).encode_to(&mut buf);
    let (key_size, n1) = u64::decode_from(&buf).unwrap();
    assert_eq!(key_size, 7);
    let (value_size, n2) = i64::decode_from(&buf[n1..]).unwrap();
    assert_eq!(value_size, -1);
    assert_eq!(n1 + n2, buf.len());
}

#[test]
fn unexpected_eof_on_truncated_buffer() {
    let buf = [0x01, 0x02, 0x03];
    let err = u64::decode_from(&buf).unwrap_err();
    assert!(matches!(
        err,
        EncodingError::UnexpectedEof {
            needed: 8,
            available: 3
        }
    ));
}

#[test]
fn unexpected_eof_on_empty_buffer() {
    assert!(u8::decode_from(&[]).is_err());
    assert!(u32::decode_from(&[]).is_err());
}
