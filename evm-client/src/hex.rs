//! Zero-allocation hex encode/decode with an optional `0x` prefix (spec §4.1).
//!
//! The in-place variants exist so the ABI/RLP hot paths can avoid short-lived
//! allocations when assembling a request payload.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum HexError {
    #[error("odd hex length after stripping prefix")]
    InvalidLength,
    #[error("invalid hex character at byte offset {0}")]
    InvalidChar(usize),
    #[error("destination buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Encodes `bytes` to a new `String`, optionally `0x`-prefixed.
pub fn encode(bytes: &[u8], with_prefix: bool) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + if with_prefix { 2 } else { 0 });
    if with_prefix {
        out.push_str("0x");
    }
    for b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Decodes a hex string (upper/lower case, optional `0x` prefix) to bytes.
pub fn decode(s: &str) -> Result<Vec<u8>, HexError> {
    let stripped = strip_prefix(s);
    if stripped.is_empty() {
        return Ok(Vec::new());
    }
    if stripped.len() % 2 != 0 {
        return Err(HexError::InvalidLength);
    }
    let mut out = vec![0u8; stripped.len() / 2];
    decode_into(s, 0, s.len(), &mut out, 0)?;
    Ok(out)
}

/// Encodes `bytes` into `buf` starting at `offset`, returning the number of
/// bytes written (including the optional `0x` prefix).
pub fn encode_into(
    bytes: &[u8],
    buf: &mut [u8],
    offset: usize,
    with_prefix: bool,
) -> Result<usize, HexError> {
    let needed = bytes.len() * 2 + if with_prefix { 2 } else { 0 };
    if buf.len() < offset + needed {
        return Err(HexError::BufferTooSmall {
            needed: offset + needed,
            available: buf.len(),
        });
    }
    let mut pos = offset;
    if with_prefix {
        buf[pos] = b'0';
        buf[pos + 1] = b'x';
        pos += 2;
    }
    for b in bytes {
        buf[pos] = HEX_CHARS[(b >> 4) as usize];
        buf[pos + 1] = HEX_CHARS[(b & 0x0f) as usize];
        pos += 2;
    }
    Ok(needed)
}

/// Decodes the hex substring `hex[hex_off..hex_off+hex_len]` into
/// `dst[dst_off..]`, returning the number of bytes written.
///
/// `hex_off`/`hex_len` describe a window into `hex` that may itself still
/// carry a `0x` prefix at its start; the prefix (if any) is skipped.
pub fn decode_into(
    hex: &str,
    hex_off: usize,
    hex_len: usize,
    dst: &mut [u8],
    dst_off: usize,
) -> Result<usize, HexError> {
    let window = &hex.as_bytes()[hex_off..hex_off + hex_len];
    let window = if window.starts_with(b"0x") || window.starts_with(b"0X") {
        &window[2..]
    } else {
        window
    };
    if window.len() % 2 != 0 {
        return Err(HexError::InvalidLength);
    }
    let out_len = window.len() / 2;
    if dst.len() < dst_off + out_len {
        return Err(HexError::BufferTooSmall {
            needed: dst_off + out_len,
            available: dst.len(),
        });
    }
    for (i, pair) in window.chunks_exact(2).enumerate() {
        let hi = hex_val(pair[0]).ok_or(HexError::InvalidChar(i * 2))?;
        let lo = hex_val(pair[1]).ok_or(HexError::InvalidChar(i * 2 + 1))?;
        dst[dst_off + i] = (hi << 4) | lo;
    }
    Ok(out_len)
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trips_to_0x() {
        assert_eq!(encode(&[], true), "0x");
        assert_eq!(decode("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn round_trip_arbitrary_bytes() {
        let bytes = [0u8, 1, 2, 254, 255, 16, 128];
        let encoded = encode(&bytes, true);
        assert_eq!(decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(decode("0xAaBbCc").unwrap(), decode("0xaabbcc").unwrap());
    }

    #[test]
    fn odd_length_after_prefix_strip_is_rejected() {
        assert_eq!(decode("0xabc"), Err(HexError::InvalidLength));
        assert_eq!(decode("abc"), Err(HexError::InvalidLength));
    }

    #[test]
    fn invalid_char_is_rejected() {
        assert!(matches!(decode("0xzz"), Err(HexError::InvalidChar(0))));
    }

    #[test]
    fn encode_into_respects_offset_and_reports_buffer_too_small() {
        let mut buf = [0u8; 8];
        let written = encode_into(&[0xab, 0xcd], &mut buf, 2, false).unwrap();
        assert_eq!(written, 4);
        assert_eq!(&buf[2..6], b"abcd");

        let mut tiny = [0u8; 3];
        assert!(matches!(
            encode_into(&[0xab, 0xcd], &mut tiny, 0, false),
            Err(HexError::BufferTooSmall { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn encode_then_decode_round_trips_for_any_bytes(bytes in proptest::collection::vec(proptest::arbitrary::any::<u8>(), 0..256)) {
            let encoded = encode(&bytes, true);
            let decoded = decode(&encoded).unwrap();
            proptest::prop_assert_eq!(decoded, bytes);
        }

        #[test]
        fn decode_never_panics_on_arbitrary_strings(s in ".*") {
            let _ = decode(&s);
        }
    }
}
