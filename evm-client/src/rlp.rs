//! Recursive Length Prefix codec (spec §4.2): byte strings, lists, and the
//! leading-zero-stripped unsigned integer encoding used by typed transactions.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RlpError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),
    #[error("length prefix overflowed usize at offset {0}")]
    LengthOverflow(usize),
    #[error("non-canonical length encoding at offset {0}")]
    NonCanonicalLength(usize),
    #[error("expected a list, found a byte string at offset {0}")]
    ExpectedList(usize),
    #[error("expected a byte string, found a list at offset {0}")]
    ExpectedString(usize),
    #[error("trailing bytes after decoding item")]
    TrailingBytes,
}

/// An owned RLP item: either a byte string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    String(Vec<u8>),
    List(Vec<RlpItem>),
}

/// Encodes a single byte string per the RLP rules (single byte < 0x80 is
/// its own encoding; otherwise a length-prefixed string).
pub fn encode_string(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = encode_length(bytes.len(), 0x80);
    out.extend_from_slice(bytes);
    out
}

/// Encodes a list of already-encoded RLP items.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(|i| i.len()).sum();
    let mut out = encode_length(payload_len, 0xc0);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Encodes an unsigned integer with leading zero bytes stripped, per the
/// convention typed transactions use for nonce/value/gas fields.
pub fn encode_unsigned(value: &[u8]) -> Vec<u8> {
    let trimmed = strip_leading_zeros(value);
    encode_string(trimmed)
}

/// Convenience wrapper for `u64` fields (nonce, gas limit, chain id, ...).
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_unsigned(&value.to_be_bytes())
}

/// Convenience wrapper for big-endian `u128`/256-bit fields passed as
/// minimal-width big-endian byte slices (e.g. from `ethnum::U256::to_be_bytes`).
pub fn encode_biguint(value_be_bytes: &[u8]) -> Vec<u8> {
    encode_unsigned(value_be_bytes)
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first_nonzero = bytes.iter().position(|&b| b != 0);
    match first_nonzero {
        Some(i) => &bytes[i..],
        None => &[],
    }
}

fn encode_length(len: usize, offset: u8) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = minimal_be_bytes(len as u64);
        let mut out = Vec::with_capacity(1 + len_bytes.len());
        out.push(offset + 55 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out
    }
}

fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let full = value.to_be_bytes();
    let first_nonzero = full.iter().position(|&b| b != 0).unwrap_or(full.len() - 1);
    full[first_nonzero..].to_vec()
}

/// Decodes a single top-level RLP item, erroring on trailing bytes.
pub fn decode(input: &[u8]) -> Result<RlpItem, RlpError> {
    let (item, consumed) = decode_item(input, 0)?;
    if consumed != input.len() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(item)
}

fn decode_item(input: &[u8], offset: usize) -> Result<(RlpItem, usize), RlpError> {
    let prefix = *input.get(offset).ok_or(RlpError::UnexpectedEof(offset))?;
    match prefix {
        0x00..=0x7f => Ok((RlpItem::String(vec![prefix]), offset + 1)),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let start = offset + 1;
            let end = start
                .checked_add(len)
                .ok_or(RlpError::LengthOverflow(offset))?;
            let bytes = input
                .get(start..end)
                .ok_or(RlpError::UnexpectedEof(offset))?;
            if len == 1 && bytes[0] < 0x80 {
                return Err(RlpError::NonCanonicalLength(offset));
            }
            Ok((RlpItem::String(bytes.to_vec()), end))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            let (len, start) = read_long_len(input, offset, len_of_len)?;
            if len < 56 {
                return Err(RlpError::NonCanonicalLength(offset));
            }
            let end = start
                .checked_add(len)
                .ok_or(RlpError::LengthOverflow(offset))?;
            let bytes = input
                .get(start..end)
                .ok_or(RlpError::UnexpectedEof(offset))?;
            Ok((RlpItem::String(bytes.to_vec()), end))
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let start = offset + 1;
            let end = start
                .checked_add(len)
                .ok_or(RlpError::LengthOverflow(offset))?;
            let items = decode_list_body(input, start, end)?;
            Ok((RlpItem::List(items), end))
        }
        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            let (len, start) = read_long_len(input, offset, len_of_len)?;
            if len < 56 {
                return Err(RlpError::NonCanonicalLength(offset));
            }
            let end = start
                .checked_add(len)
                .ok_or(RlpError::LengthOverflow(offset))?;
            let items = decode_list_body(input, start, end)?;
            Ok((RlpItem::List(items), end))
        }
    }
}

fn read_long_len(
    input: &[u8],
    offset: usize,
    len_of_len: usize,
) -> Result<(usize, usize), RlpError> {
    let start = offset + 1;
    let end = start
        .checked_add(len_of_len)
        .ok_or(RlpError::LengthOverflow(offset))?;
    let len_bytes = input
        .get(start..end)
        .ok_or(RlpError::UnexpectedEof(offset))?;
    if len_bytes.first() == Some(&0) {
        return Err(RlpError::NonCanonicalLength(offset));
    }
    let mut len: u64 = 0;
    for &b in len_bytes {
        len = len
            .checked_shl(8)
            .and_then(|v| v.checked_add(b as u64))
            .ok_or(RlpError::LengthOverflow(offset))?;
    }
    Ok((len as usize, end))
}

fn decode_list_body(input: &[u8], start: usize, end: usize) -> Result<Vec<RlpItem>, RlpError> {
    let body = input.get(start..end).ok_or(RlpError::UnexpectedEof(start))?;
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        let (item, consumed) = decode_item(body, pos)?;
        items.push(item);
        pos = consumed;
    }
    Ok(items)
}

impl RlpItem {
    pub fn as_string(&self) -> Result<&[u8], RlpError> {
        match self {
            RlpItem::String(s) => Ok(s),
            RlpItem::List(_) => Err(RlpError::ExpectedString(0)),
        }
    }

    pub fn as_list(&self) -> Result<&[RlpItem], RlpError> {
        match self {
            RlpItem::List(l) => Ok(l),
            RlpItem::String(_) => Err(RlpError::ExpectedList(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_below_0x80_is_its_own_encoding() {
        assert_eq!(encode_string(&[0x00]), vec![0x00]);
        assert_eq!(encode_string(&[0x7f]), vec![0x7f]);
    }

    #[test]
    fn empty_string_encodes_to_0x80() {
        assert_eq!(encode_string(&[]), vec![0x80]);
    }

    #[test]
    fn short_string_known_vector_dog() {
        // "dog" -> 0x83 'd' 'o' 'g', the canonical RLP example.
        assert_eq!(encode_string(b"dog"), vec![0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn long_string_uses_length_of_length_prefix() {
        let payload = vec![b'a'; 56];
        let encoded = encode_string(&payload);
        assert_eq!(encoded[0], 0xb8);
        assert_eq!(encoded[1], 56);
        assert_eq!(&encoded[2..], payload.as_slice());
    }

    #[test]
    fn empty_list_encodes_to_0xc0() {
        assert_eq!(encode_list(&[]), vec![0xc0]);
    }

    #[test]
    fn list_of_strings_known_vector() {
        // ["cat", "dog"] -> 0xc8 0x83 c a t 0x83 d o g
        let items = vec![encode_string(b"cat"), encode_string(b"dog")];
        assert_eq!(
            encode_list(&items),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn unsigned_strips_leading_zeros() {
        assert_eq!(encode_unsigned(&[0x00, 0x00, 0x01]), vec![0x01]);
        assert_eq!(encode_unsigned(&[0x00, 0x00, 0x00]), vec![0x80]);
    }

    #[test]
    fn u64_zero_encodes_empty_string() {
        assert_eq!(encode_u64(0), vec![0x80]);
        assert_eq!(encode_u64(15), vec![0x0f]);
        assert_eq!(encode_u64(1024), vec![0x82, 0x04, 0x00]);
    }

    #[test]
    fn round_trip_nested_list() {
        let inner = encode_list(&[encode_string(b"a"), encode_string(b"bc")]);
        let outer = encode_list(&[inner.clone(), encode_string(b"d")]);
        let decoded = decode(&outer).unwrap();
        match decoded {
            RlpItem::List(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].as_string().unwrap(), b"d");
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn non_canonical_single_byte_string_is_rejected() {
        // 0x81 0x00 encodes the single byte 0x00 the long way; canonical form is just 0x00.
        assert_eq!(decode(&[0x81, 0x00]), Err(RlpError::NonCanonicalLength(0)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        assert_eq!(decode(&[0x80, 0x80]), Err(RlpError::TrailingBytes));
    }

    proptest::proptest! {
        #[test]
        fn encode_string_then_decode_round_trips(bytes in proptest::collection::vec(proptest::arbitrary::any::<u8>(), 0..300)) {
            let encoded = encode_string(&bytes);
            let decoded = decode(&encoded).unwrap();
            proptest::prop_assert_eq!(decoded.as_string().unwrap(), bytes.as_slice());
        }

        #[test]
        fn encode_u64_then_decode_round_trips(value in proptest::arbitrary::any::<u64>()) {
            let encoded = encode_u64(value);
            let decoded = decode(&encoded).unwrap();
            let bytes = decoded.as_string().unwrap();
            let mut padded = [0u8; 8];
            padded[8 - bytes.len()..].copy_from_slice(bytes);
            proptest::prop_assert_eq!(u64::from_be_bytes(padded), value);
        }

        #[test]
        fn decode_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(proptest::arbitrary::any::<u8>(), 0..64)) {
            let _ = decode(&bytes);
        }
    }
}
