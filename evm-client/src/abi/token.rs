use super::{encode_uint_word, keccak256, AbiError, WORD};

/// A decoded/encodable Solidity value (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint { bits: u16, value: Vec<u8> },
    Int { bits: u16, value: Vec<u8> },
    Address([u8; 20]),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
    FixedArray(Vec<Token>),
    Tuple(Vec<Token>),
}

/// A Solidity type descriptor, used to drive decoding (which has no values
/// to infer shape from).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Uint(u16),
    Int(u16),
    Address,
    Bool,
    FixedBytes(u8),
    Bytes,
    String,
    Array(Box<AbiType>),
    FixedArray(Box<AbiType>, usize),
    Tuple(Vec<AbiType>),
}

impl Token {
    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::FixedArray(items) | Token::Tuple(items) => {
                items.iter().any(Token::is_dynamic)
            }
            _ => false,
        }
    }

    /// Encodes this token as a standalone value: a single head word for
    /// static types, or the full tail payload for dynamic ones.
    pub fn encode(&self) -> Result<Vec<u8>, AbiError> {
        match self {
            Token::Uint { bits, value } => encode_uint(*bits, value, false),
            Token::Int { bits, value } => encode_uint(*bits, value, true),
            Token::Address(addr) => {
                let mut word = [0u8; WORD];
                word[WORD - 20..].copy_from_slice(addr);
                Ok(word.to_vec())
            }
            Token::Bool(b) => Ok(encode_uint_word(*b as u128)),
            Token::FixedBytes(bytes) => {
                if bytes.len() > WORD {
                    return Err(AbiError::AbiEncoding {
                        type_: format!("bytes{}", bytes.len()),
                        reason: "fixed bytes longer than 32".to_string(),
                    });
                }
                let mut word = [0u8; WORD];
                word[..bytes.len()].copy_from_slice(bytes);
                Ok(word.to_vec())
            }
            Token::Bytes(bytes) => Ok(encode_dynamic_bytes(bytes)),
            Token::String(s) => Ok(encode_dynamic_bytes(s.as_bytes())),
            Token::Array(items) => encode_array(items, true),
            Token::FixedArray(items) => encode_array(items, false),
            Token::Tuple(items) => encode_tuple(items),
        }
    }

    /// Encodes the value in its EIP-712 "hashing form": atomics use their
    /// ABI head, `bytes`/`string` hash their content, arrays/structs are
    /// left for the caller (eip712 module) to assemble via `hashStruct`.
    pub fn encode_712_atomic(&self) -> Result<[u8; WORD], AbiError> {
        match self {
            Token::Bytes(bytes) => Ok(keccak256(bytes)),
            Token::String(s) => Ok(keccak256(s.as_bytes())),
            other => {
                let encoded = other.encode()?;
                let mut word = [0u8; WORD];
                word.copy_from_slice(&encoded[..WORD]);
                Ok(word)
            }
        }
    }
}

fn encode_uint(bits: u16, value_be: &[u8], signed: bool) -> Result<Vec<u8>, AbiError> {
    let type_name = uint_type_name(bits, signed);
    if value_be.len() > WORD {
        return Err(AbiError::AbiEncoding {
            type_: type_name,
            reason: "value wider than 32 bytes".to_string(),
        });
    }
    let mut word = [0u8; WORD];
    word[WORD - value_be.len()..].copy_from_slice(value_be);
    check_width_bits(&word, bits, signed, &type_name)?;
    Ok(word.to_vec())
}

fn uint_type_name(bits: u16, signed: bool) -> String {
    if signed {
        format!("int{bits}")
    } else {
        format!("uint{bits}")
    }
}

/// Refuses a word whose bits above the declared width are set (unsigned) or
/// aren't a valid sign-extension (signed) — spec §4.3 "non-zero high bits in
/// fixed-size fields" applies on both the encode and decode paths.
fn check_width_bits(word: &[u8; WORD], bits: u16, signed: bool, type_name: &str) -> Result<(), AbiError> {
    if bits >= 256 {
        return Ok(());
    }
    let usable_bits = bits as u32;
    let byte_idx = WORD - (usable_bits as usize).div_ceil(8);
    let bit_offset = usable_bits % 8;
    if bit_offset != 0 {
        let mask = 0xffu8 << bit_offset;
        if word[byte_idx] & mask != 0 {
            return Err(AbiError::NonZeroHighBits {
                type_: type_name.to_string(),
            });
        }
    }
    for b in &word[..byte_idx] {
        if *b != 0 && !(signed && is_sign_extension_byte(word, byte_idx)) {
            return Err(AbiError::NonZeroHighBits {
                type_: type_name.to_string(),
            });
        }
    }
    Ok(())
}

fn is_sign_extension_byte(word: &[u8; WORD], byte_idx: usize) -> bool {
    // Negative two's-complement values legitimately carry 0xff padding above
    // the declared bit width; this accepts that pattern for signed ints.
    word[..byte_idx].iter().all(|&b| b == 0xff)
}

fn encode_dynamic_bytes(data: &[u8]) -> Vec<u8> {
    let len_word = encode_uint_word(data.len() as u128);
    let padded_len = data.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded_len);
    out.extend_from_slice(&len_word);
    out.extend_from_slice(data);
    out.resize(WORD + padded_len, 0);
    out
}

fn encode_array(items: &[Token], dynamic_length: bool) -> Result<Vec<u8>, AbiError> {
    let element_dynamic = items.iter().any(Token::is_dynamic);
    let mut body = Vec::new();
    if element_dynamic {
        body = super::encode(items)?;
    } else {
        for item in items {
            body.extend_from_slice(&item.encode()?);
        }
    }
    if dynamic_length {
        let mut out = encode_uint_word(items.len() as u128);
        out.extend_from_slice(&body);
        Ok(out)
    } else {
        Ok(body)
    }
}

fn encode_tuple(items: &[Token]) -> Result<Vec<u8>, AbiError> {
    super::encode(items)
}

pub(super) fn decode_one(ty: &AbiType, data: &[u8], head_cursor: usize) -> Result<Token, AbiError> {
    decode_one_based(ty, data, head_cursor, 0)
}

/// Decodes one value whose head lives at `head_cursor`, treating any offset
/// word it carries as relative to `base` rather than the start of `data`.
/// `base` is the start of the enclosing dynamic value's own tail (0 at the
/// top level, or the first byte after an array's length word one level in)
/// so a dynamic element nested inside a dynamic array resolves its own
/// offsets against its array's tail, not the outermost argument list.
fn decode_one_based(
    ty: &AbiType,
    data: &[u8],
    head_cursor: usize,
    base: usize,
) -> Result<Token, AbiError> {
    let type_name = format!("{ty:?}");
    let word = read_word(data, head_cursor, &type_name)?;
    match ty {
        AbiType::Uint(bits) => {
            check_width_bits(&word, *bits, false, &uint_type_name(*bits, false))?;
            Ok(Token::Uint {
                bits: *bits,
                value: word.to_vec(),
            })
        }
        AbiType::Int(bits) => {
            check_width_bits(&word, *bits, true, &uint_type_name(*bits, true))?;
            Ok(Token::Int {
                bits: *bits,
                value: word.to_vec(),
            })
        }
        AbiType::Bool => Ok(Token::Bool(word[WORD - 1] != 0)),
        AbiType::Address => {
            if word[..WORD - 20].iter().any(|&b| b != 0) {
                return Err(AbiError::NonZeroHighBits {
                    type_: "address".to_string(),
                });
            }
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&word[WORD - 20..]);
            Ok(Token::Address(addr))
        }
        AbiType::FixedBytes(n) => Ok(Token::FixedBytes(word[..*n as usize].to_vec())),
        AbiType::Bytes => {
            let offset = base + be_word_to_usize(&word, &type_name)?;
            let (len, content) = read_dynamic(data, offset, &type_name)?;
            Ok(Token::Bytes(content[..len].to_vec()))
        }
        AbiType::String => {
            let offset = base + be_word_to_usize(&word, &type_name)?;
            let (len, content) = read_dynamic(data, offset, &type_name)?;
            let s = String::from_utf8(content[..len].to_vec()).map_err(|_| AbiError::AbiDecoding {
                type_: "string".to_string(),
                reason: "invalid utf-8".to_string(),
            })?;
            Ok(Token::String(s))
        }
        AbiType::FixedArray(elem_ty, n) => {
            if elem_type_is_dynamic(elem_ty) {
                // A fixed array of dynamic-size elements is itself dynamic:
                // its head word is an offset to a tail holding N elements'
                // own head/tail scheme, the same shape a dynamic `Array`'s
                // body takes after its length word (minus the length word).
                let array_base = base + be_word_to_usize(&word, &type_name)?;
                let mut items = Vec::with_capacity(*n);
                for i in 0..*n {
                    items.push(decode_one_based(
                        elem_ty,
                        data,
                        array_base + i * WORD,
                        array_base,
                    )?);
                }
                Ok(Token::FixedArray(items))
            } else {
                let mut items = Vec::with_capacity(*n);
                for i in 0..*n {
                    items.push(decode_one_based(elem_ty, data, head_cursor + i * WORD, base)?);
                }
                Ok(Token::FixedArray(items))
            }
        }
        AbiType::Array(elem_ty) => {
            let offset = base + be_word_to_usize(&word, &type_name)?;
            let len_word = read_word(data, offset, &type_name)?;
            let len = be_word_to_usize(&len_word, &type_name)?;
            let array_base = offset + WORD;
            let mut items = Vec::with_capacity(len);
            for i in 0..len {
                items.push(decode_one_based(elem_ty, data, array_base + i * WORD, array_base)?);
            }
            Ok(Token::Array(items))
        }
        AbiType::Tuple(types) => {
            let mut items = Vec::with_capacity(types.len());
            for (i, t) in types.iter().enumerate() {
                items.push(decode_one_based(t, data, head_cursor + i * WORD, base)?);
            }
            Ok(Token::Tuple(items))
        }
    }
}

fn elem_type_is_dynamic(ty: &AbiType) -> bool {
    matches!(
        ty,
        AbiType::Bytes | AbiType::String | AbiType::Array(_)
    )
}

fn read_word(data: &[u8], offset: usize, type_name: &str) -> Result<[u8; WORD], AbiError> {
    let slice = data
        .get(offset..offset + WORD)
        .ok_or_else(|| AbiError::Truncated {
            type_: type_name.to_string(),
            offset,
        })?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_dynamic<'a>(
    data: &'a [u8],
    offset: usize,
    type_name: &str,
) -> Result<(usize, &'a [u8]), AbiError> {
    let len_word = read_word(data, offset, type_name)?;
    let len = be_word_to_usize(&len_word, type_name)?;
    let content = data
        .get(offset + WORD..offset + WORD + len)
        .ok_or_else(|| AbiError::Truncated {
            type_: type_name.to_string(),
            offset: offset + WORD,
        })?;
    Ok((len, content))
}

fn be_word_to_usize(word: &[u8; WORD], type_name: &str) -> Result<usize, AbiError> {
    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(AbiError::AbiDecoding {
            type_: type_name.to_string(),
            reason: "offset/length exceeds usize range".to_string(),
        });
    }
    let mut eight = [0u8; 8];
    eight.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(eight) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_round_trips() {
        let token = Token::Bool(true);
        let encoded = token.encode().unwrap();
        let decoded = decode_one(&AbiType::Bool, &encoded, 0).unwrap();
        assert_eq!(decoded, Token::Bool(true));
    }

    #[test]
    fn dynamic_bytes_round_trip_via_top_level_encode() {
        let token = Token::Bytes(vec![1, 2, 3, 4, 5]);
        let encoded = super::super::encode(&[token.clone()]).unwrap();
        let decoded = super::super::decode(&[AbiType::Bytes], &encoded).unwrap();
        assert_eq!(decoded[0], token);
    }

    #[test]
    fn uint8_rejects_value_with_high_bits_set() {
        let result = encode_uint(8, &[0x01, 0x00], false);
        assert!(result.is_err());
    }

    #[test]
    fn decoding_uint8_rejects_non_zero_high_bits() {
        let mut word = [0u8; WORD];
        word[WORD - 2] = 0x01; // bit set above the declared 8-bit width
        let result = decode_one(&AbiType::Uint(8), &word, 0);
        assert!(matches!(result, Err(AbiError::NonZeroHighBits { .. })));
    }

    #[test]
    fn decoding_uint8_accepts_value_within_width() {
        let mut word = [0u8; WORD];
        word[WORD - 1] = 0xff;
        let decoded = decode_one(&AbiType::Uint(8), &word, 0).unwrap();
        assert_eq!(decoded, Token::Uint { bits: 8, value: word.to_vec() });
    }

    #[test]
    fn address_left_pads_to_32_bytes() {
        let addr = [0xabu8; 20];
        let token = Token::Address(addr);
        let encoded = token.encode().unwrap();
        assert_eq!(&encoded[..12], &[0u8; 12]);
        assert_eq!(&encoded[12..], &addr);
    }

    #[test]
    fn dynamic_length_array_of_strings_round_trips() {
        let token = Token::Array(vec![
            Token::String("alice".to_string()),
            Token::String("bob".to_string()),
        ]);
        let encoded = super::super::encode(&[token.clone()]).unwrap();
        let decoded =
            super::super::decode(&[AbiType::Array(Box::new(AbiType::String))], &encoded).unwrap();
        assert_eq!(decoded[0], token);
    }

    #[test]
    fn fixed_array_of_dynamic_bytes_round_trips() {
        let token = Token::FixedArray(vec![
            Token::Bytes(vec![1, 2, 3]),
            Token::Bytes(vec![4, 5, 6, 7, 8]),
        ]);
        let encoded = super::super::encode(&[token.clone()]).unwrap();
        let decoded = super::super::decode(
            &[AbiType::FixedArray(Box::new(AbiType::Bytes), 2)],
            &encoded,
        )
        .unwrap();
        assert_eq!(decoded[0], token);
    }
}
