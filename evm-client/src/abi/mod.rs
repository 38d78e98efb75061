//! Solidity ABI encode/decode (spec §4.3): atomic types, fixed/dynamic
//! arrays, tuples, and function selectors.

mod token;

pub use token::{AbiType, Token};

use sha3::{Digest, Keccak256};
use thiserror::Error;

pub const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AbiError {
    #[error("ABI encoding failed for {type_}: {reason}")]
    AbiEncoding { type_: String, reason: String },

    #[error("ABI decoding failed for {type_}: {reason}")]
    AbiDecoding { type_: String, reason: String },

    #[error("input truncated while decoding {type_} at offset {offset}")]
    Truncated { type_: String, offset: usize },

    #[error("non-zero high bits in fixed-size field {type_}")]
    NonZeroHighBits { type_: String },
}

/// Encodes a top-level argument list using the head/tail scheme (spec §4.3).
///
/// Each top-level argument contributes one head word (or, for dynamic types,
/// an offset word) plus, for dynamic arguments, a tail appended after all
/// heads.
pub fn encode(tokens: &[Token]) -> Result<Vec<u8>, AbiError> {
    let mut heads: Vec<Vec<u8>> = Vec::with_capacity(tokens.len());
    let mut tails: Vec<Vec<u8>> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_dynamic() {
            heads.push(Vec::new()); // placeholder, patched below
            tails.push(token.encode()?);
        } else {
            heads.push(token.encode()?);
            tails.push(Vec::new());
        }
    }

    let heads_len: usize = heads.len() * WORD;
    let mut tail_offset = heads_len;
    let mut out = Vec::with_capacity(heads_len + tails.iter().map(|t| t.len()).sum::<usize>());
    let mut patched_heads = Vec::with_capacity(heads.len());
    for (i, token) in tokens.iter().enumerate() {
        if token.is_dynamic() {
            patched_heads.push(encode_uint_word(tail_offset as u128));
            tail_offset += tails[i].len();
        } else {
            patched_heads.push(heads[i].clone());
        }
    }
    for head in &patched_heads {
        out.extend_from_slice(head);
    }
    for tail in &tails {
        out.extend_from_slice(tail);
    }
    Ok(out)
}

/// Decodes a top-level argument list given the expected types.
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let mut out = Vec::with_capacity(types.len());
    let mut head_cursor = 0;
    for ty in types {
        out.push(token::decode_one(ty, data, head_cursor)?);
        head_cursor += WORD;
    }
    Ok(out)
}

/// First 4 bytes of `keccak256(canonical_signature)` (spec §4.3, §7.1).
pub fn function_selector(canonical_signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(canonical_signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Builds the canonical signature `name(type1,type2,...)` with no spaces.
pub fn canonical_signature(name: &str, arg_types: &[&str]) -> String {
    format!("{}({})", name, arg_types.join(","))
}

pub(crate) fn encode_uint_word(value: u128) -> Vec<u8> {
    let mut word = [0u8; WORD];
    word[WORD - 16..].copy_from_slice(&value.to_be_bytes());
    word.to_vec()
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_deterministic() {
        let sig = canonical_signature("transfer", &["address", "uint256"]);
        assert_eq!(sig, "transfer(address,uint256)");
        let selector = function_selector(&sig);
        assert_eq!(hex::encode(selector), "a9059cbb");
    }

    #[test]
    fn transfer_calldata_matches_known_vector() {
        let to = Token::Address([
            0x70, 0x99, 0x79, 0x70, 0xC5, 0x18, 0x12, 0xdc, 0x3A, 0x01, 0x0C, 0x7d, 0x01, 0xb5,
            0x0e, 0x0d, 0x17, 0xdc, 0x79, 0xC8,
        ]);
        let amount = Token::Uint {
            bits: 256,
            value: 1_000_000_000_000_000_000u128.to_be_bytes().to_vec(),
        };
        let encoded = encode(&[to, amount]).unwrap();
        let selector = function_selector("transfer(address,uint256)");
        let mut calldata = selector.to_vec();
        calldata.extend_from_slice(&encoded);
        assert_eq!(
            hex::encode(&calldata),
            "a9059cbb\
             00000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8\
             0000000000000000000000000000000000000000000000000de0b6b3a7640000"
        );
    }
}
