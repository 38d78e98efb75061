//! EIP-712 typed-data hashing (spec §4.4): dependency resolution, canonical
//! type strings, `hashStruct`, domain separator, and the final digest.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::abi::{keccak256, Token};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Eip712Error {
    #[error("unknown struct type: {0}")]
    UnknownType(String),
    #[error("cyclic type dependency involving: {0}")]
    CyclicDependency(String),
    #[error("invalid value for field {field} of type {type_}: {reason}")]
    InvalidValue {
        field: String,
        type_: String,
        reason: String,
    },
    #[error("value out of range for {type_}")]
    ValueOutOfRange { type_: String },
    #[error("missing field {field} in value for type {type_}")]
    MissingField { field: String, type_: String },
}

/// One field of a struct type: `(name, solidity_type)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub type_: String,
}

/// The full set of struct type definitions referenced by a typed-data
/// message, keyed by type name.
pub type TypeMap = BTreeMap<String, Vec<FieldDef>>;

/// A message value: either a scalar (already hex/decimal-stringified),
/// a nested struct, or an array of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Struct(HashMap<String, Value>),
    Array(Vec<Value>),
}

/// The `EIP712Domain` fields actually populated for a given signing domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domain {
    pub name: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<u64>,
    pub verifying_contract: Option<[u8; 20]>,
    pub salt: Option<[u8; 32]>,
}

/// Resolves the set of struct types reachable from `primary_type`,
/// detecting cycles (spec §4.4 "Dependency resolution").
pub fn resolve_dependencies(
    types: &TypeMap,
    primary_type: &str,
) -> Result<HashSet<String>, Eip712Error> {
    let mut visiting = HashSet::new();
    let mut reached = HashSet::new();
    walk(types, primary_type, &mut visiting, &mut reached)?;
    Ok(reached)
}

fn walk(
    types: &TypeMap,
    type_name: &str,
    visiting: &mut HashSet<String>,
    reached: &mut HashSet<String>,
) -> Result<(), Eip712Error> {
    if reached.contains(type_name) {
        return Ok(());
    }
    if visiting.contains(type_name) {
        return Err(Eip712Error::CyclicDependency(type_name.to_string()));
    }
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::UnknownType(type_name.to_string()))?;
    visiting.insert(type_name.to_string());
    reached.insert(type_name.to_string());
    for field in fields {
        let base = strip_array_suffix(&field.type_);
        if types.contains_key(base) {
            walk(types, base, visiting, reached)?;
        }
    }
    visiting.remove(type_name);
    Ok(())
}

fn strip_array_suffix(type_: &str) -> &str {
    match type_.find('[') {
        Some(idx) => &type_[..idx],
        None => type_,
    }
}

/// Emits `Name(type1 field1,type2 field2,...)` with no whitespace.
fn format_type(name: &str, fields: &[FieldDef]) -> String {
    let joined = fields
        .iter()
        .map(|f| format!("{} {}", f.type_, f.name))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}({joined})")
}

/// Builds the canonical type string: primary type first, then all other
/// reachable types sorted by name (spec §4.4 "Canonical type string").
pub fn canonical_type_string(types: &TypeMap, primary_type: &str) -> Result<String, Eip712Error> {
    let reached = resolve_dependencies(types, primary_type)?;
    let mut others: Vec<&String> = reached.iter().filter(|t| t.as_str() != primary_type).collect();
    others.sort();

    let mut out = format_type(primary_type, &types[primary_type]);
    for name in others {
        out.push_str(&format_type(name, &types[name]));
    }
    Ok(out)
}

/// `typeHash(name) = keccak256(canonical_type_string(name))`.
pub fn type_hash(types: &TypeMap, type_name: &str) -> Result<[u8; 32], Eip712Error> {
    let s = canonical_type_string(types, type_name)?;
    Ok(keccak256(s.as_bytes()))
}

/// `hashStruct(name, value)` per spec §4.4.
pub fn hash_struct(
    types: &TypeMap,
    type_name: &str,
    value: &HashMap<String, Value>,
) -> Result<[u8; 32], Eip712Error> {
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::UnknownType(type_name.to_string()))?;
    let mut buf = type_hash(types, type_name)?.to_vec();
    for field in fields {
        let field_value = value.get(&field.name).ok_or_else(|| Eip712Error::MissingField {
            field: field.name.clone(),
            type_: type_name.to_string(),
        })?;
        let encoded = encode_field(types, &field.type_, &field.name, field_value)?;
        buf.extend_from_slice(&encoded);
    }
    Ok(keccak256(&buf))
}

fn encode_field(
    types: &TypeMap,
    type_: &str,
    field_name: &str,
    value: &Value,
) -> Result<[u8; 32], Eip712Error> {
    if let Some(elem_type) = array_element_type(type_) {
        let items = match value {
            Value::Array(items) => items,
            _ => {
                return Err(Eip712Error::InvalidValue {
                    field: field_name.to_string(),
                    type_: type_.to_string(),
                    reason: "expected array value".to_string(),
                })
            }
        };
        let mut concat = Vec::with_capacity(items.len() * 32);
        for item in items {
            concat.extend_from_slice(&encode_field(types, elem_type, field_name, item)?);
        }
        return Ok(keccak256(&concat));
    }

    if types.contains_key(type_) {
        let nested = match value {
            Value::Struct(map) => map,
            _ => {
                return Err(Eip712Error::InvalidValue {
                    field: field_name.to_string(),
                    type_: type_.to_string(),
                    reason: "expected struct value".to_string(),
                })
            }
        };
        return hash_struct(types, type_, nested);
    }

    match type_ {
        "string" | "bytes" => {
            let s = match value {
                Value::Scalar(s) => s,
                _ => {
                    return Err(Eip712Error::InvalidValue {
                        field: field_name.to_string(),
                        type_: type_.to_string(),
                        reason: "expected scalar value".to_string(),
                    })
                }
            };
            let bytes = if type_ == "bytes" {
                crate::hex::decode(s).map_err(|e| Eip712Error::InvalidValue {
                    field: field_name.to_string(),
                    type_: type_.to_string(),
                    reason: e.to_string(),
                })?
            } else {
                s.clone().into_bytes()
            };
            Ok(keccak256(&bytes))
        }
        _ => {
            let token = scalar_to_token(type_, field_name, value)?;
            token.encode_712_atomic().map_err(|e| Eip712Error::InvalidValue {
                field: field_name.to_string(),
                type_: type_.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

fn array_element_type(type_: &str) -> Option<&str> {
    if !type_.ends_with(']') {
        return None;
    }
    let open = type_.rfind('[')?;
    Some(&type_[..open])
}

/// Parses a scalar message value into an ABI `Token`, accepting either
/// decimal or `0x`-prefixed hex strings for integer types (spec §4.4 edge
/// cases).
fn scalar_to_token(type_: &str, field_name: &str, value: &Value) -> Result<Token, Eip712Error> {
    let s = match value {
        Value::Scalar(s) => s.as_str(),
        _ => {
            return Err(Eip712Error::InvalidValue {
                field: field_name.to_string(),
                type_: type_.to_string(),
                reason: "expected scalar value".to_string(),
            })
        }
    };

    if let Some(bits_str) = type_.strip_prefix("uint") {
        let bits: u16 = parse_width(bits_str, type_)?;
        let value = parse_decimal_or_hex(s, type_)?;
        return Ok(Token::Uint { bits, value });
    }
    if let Some(bits_str) = type_.strip_prefix("int") {
        let bits: u16 = parse_width(bits_str, type_)?;
        let value = parse_decimal_or_hex(s, type_)?;
        return Ok(Token::Int { bits, value });
    }
    if type_ == "address" {
        let bytes = crate::hex::decode(s).map_err(|e| Eip712Error::InvalidValue {
            field: field_name.to_string(),
            type_: type_.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() != 20 {
            return Err(Eip712Error::ValueOutOfRange {
                type_: type_.to_string(),
            });
        }
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        return Ok(Token::Address(addr));
    }
    if type_ == "bool" {
        return Ok(Token::Bool(s == "true" || s == "1"));
    }
    if let Some(n_str) = type_.strip_prefix("bytes") {
        if let Ok(n) = n_str.parse::<u8>() {
            let bytes = crate::hex::decode(s).map_err(|e| Eip712Error::InvalidValue {
                field: field_name.to_string(),
                type_: type_.to_string(),
                reason: e.to_string(),
            })?;
            if bytes.len() != n as usize {
                return Err(Eip712Error::ValueOutOfRange {
                    type_: type_.to_string(),
                });
            }
            return Ok(Token::FixedBytes(bytes));
        }
    }
    Err(Eip712Error::InvalidValue {
        field: field_name.to_string(),
        type_: type_.to_string(),
        reason: "unsupported atomic type".to_string(),
    })
}

fn parse_width(bits_str: &str, type_: &str) -> Result<u16, Eip712Error> {
    bits_str
        .parse::<u16>()
        .map_err(|_| Eip712Error::ValueOutOfRange {
            type_: type_.to_string(),
        })
}

fn parse_decimal_or_hex(s: &str, type_: &str) -> Result<Vec<u8>, Eip712Error> {
    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        crate::hex::decode(hex_digits).map_err(|e| Eip712Error::InvalidValue {
            field: String::new(),
            type_: type_.to_string(),
            reason: e.to_string(),
        })
    } else if let Some(rest) = s.strip_prefix('-') {
        // Two's-complement encode a negative decimal value into 32 bytes.
        let magnitude: u128 = rest.parse().map_err(|_| Eip712Error::ValueOutOfRange {
            type_: type_.to_string(),
        })?;
        let mut word = [0xffu8; 32];
        let mag_bytes = magnitude.to_be_bytes();
        let mut borrow = 1u16;
        for i in (0..16).rev() {
            let inverted = !mag_bytes[i] as u16 + borrow;
            word[32 - 16 + i] = inverted as u8;
            borrow = inverted >> 8;
        }
        Ok(word.to_vec())
    } else {
        let magnitude: u128 = s.parse().map_err(|_| Eip712Error::ValueOutOfRange {
            type_: type_.to_string(),
        })?;
        Ok(magnitude.to_be_bytes().to_vec())
    }
}

fn domain_type_def(domain: &Domain) -> Vec<FieldDef> {
    let mut fields = Vec::new();
    if domain.name.is_some() {
        fields.push(FieldDef {
            name: "name".to_string(),
            type_: "string".to_string(),
        });
    }
    if domain.version.is_some() {
        fields.push(FieldDef {
            name: "version".to_string(),
            type_: "string".to_string(),
        });
    }
    if domain.chain_id.is_some() {
        fields.push(FieldDef {
            name: "chainId".to_string(),
            type_: "uint256".to_string(),
        });
    }
    if domain.verifying_contract.is_some() {
        fields.push(FieldDef {
            name: "verifyingContract".to_string(),
            type_: "address".to_string(),
        });
    }
    if domain.salt.is_some() {
        fields.push(FieldDef {
            name: "salt".to_string(),
            type_: "bytes32".to_string(),
        });
    }
    fields
}

fn domain_value(domain: &Domain) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    if let Some(name) = &domain.name {
        map.insert("name".to_string(), Value::Scalar(name.clone()));
    }
    if let Some(version) = &domain.version {
        map.insert("version".to_string(), Value::Scalar(version.clone()));
    }
    if let Some(chain_id) = domain.chain_id {
        map.insert("chainId".to_string(), Value::Scalar(chain_id.to_string()));
    }
    if let Some(addr) = domain.verifying_contract {
        map.insert(
            "verifyingContract".to_string(),
            Value::Scalar(crate::hex::encode(&addr, true)),
        );
    }
    if let Some(salt) = domain.salt {
        map.insert("salt".to_string(), Value::Scalar(crate::hex::encode(&salt, true)));
    }
    map
}

/// Computes the domain separator (spec §4.4 "Domain separator").
pub fn domain_separator(domain: &Domain) -> Result<[u8; 32], Eip712Error> {
    let mut types = TypeMap::new();
    types.insert("EIP712Domain".to_string(), domain_type_def(domain));
    hash_struct(&types, "EIP712Domain", &domain_value(domain))
}

/// Computes the final EIP-712 digest: `keccak256(0x1901 || domainSeparator
/// || hashStruct(primaryType, message))` (spec §4.4 "Digest").
pub fn encode_digest(
    domain: &Domain,
    types: &TypeMap,
    primary_type: &str,
    message: &HashMap<String, Value>,
) -> Result<[u8; 32], Eip712Error> {
    let domain_sep = domain_separator(domain)?;
    let struct_hash = hash_struct(types, primary_type, message)?;
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.push(0x19);
    buf.push(0x01);
    buf.extend_from_slice(&domain_sep);
    buf.extend_from_slice(&struct_hash);
    Ok(keccak256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_types() -> TypeMap {
        let mut types = TypeMap::new();
        types.insert(
            "Person".to_string(),
            vec![
                FieldDef {
                    name: "name".to_string(),
                    type_: "string".to_string(),
                },
                FieldDef {
                    name: "wallet".to_string(),
                    type_: "address".to_string(),
                },
            ],
        );
        types.insert(
            "Mail".to_string(),
            vec![
                FieldDef {
                    name: "from".to_string(),
                    type_: "Person".to_string(),
                },
                FieldDef {
                    name: "to".to_string(),
                    type_: "Person".to_string(),
                },
                FieldDef {
                    name: "contents".to_string(),
                    type_: "string".to_string(),
                },
            ],
        );
        types
    }

    #[test]
    fn canonical_type_string_matches_eip712_mail_example() {
        let types = mail_types();
        let s = canonical_type_string(&types, "Mail").unwrap();
        assert_eq!(
            s,
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
    }

    #[test]
    fn cyclic_dependency_is_rejected() {
        let mut types = TypeMap::new();
        types.insert(
            "A".to_string(),
            vec![FieldDef {
                name: "b".to_string(),
                type_: "B".to_string(),
            }],
        );
        types.insert(
            "B".to_string(),
            vec![FieldDef {
                name: "a".to_string(),
                type_: "A".to_string(),
            }],
        );
        assert!(matches!(
            resolve_dependencies(&types, "A"),
            Err(Eip712Error::CyclicDependency(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let types = TypeMap::new();
        assert!(matches!(
            resolve_dependencies(&types, "Ghost"),
            Err(Eip712Error::UnknownType(_))
        ));
    }

    #[test]
    fn mail_digest_matches_known_eip712_vector() {
        let types = mail_types();
        let domain = Domain {
            name: Some("Ether Mail".to_string()),
            version: Some("1".to_string()),
            chain_id: Some(1),
            verifying_contract: Some(hex_addr("CcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC")),
            salt: None,
        };

        let mut from = HashMap::new();
        from.insert("name".to_string(), Value::Scalar("Cow".to_string()));
        from.insert(
            "wallet".to_string(),
            Value::Scalar("0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826".to_string()),
        );
        let mut to = HashMap::new();
        to.insert("name".to_string(), Value::Scalar("Bob".to_string()));
        to.insert(
            "wallet".to_string(),
            Value::Scalar("0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB".to_string()),
        );
        let mut mail = HashMap::new();
        mail.insert("from".to_string(), Value::Struct(from));
        mail.insert("to".to_string(), Value::Struct(to));
        mail.insert(
            "contents".to_string(),
            Value::Scalar("Hello, Bob!".to_string()),
        );

        let digest = encode_digest(&domain, &types, "Mail", &mail).unwrap();
        assert_eq!(
            crate::hex::encode(&digest, true),
            "0xbe609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
        );
    }

    fn hex_addr(s: &str) -> [u8; 20] {
        let bytes = crate::hex::decode(s).unwrap();
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        addr
    }

    #[test]
    fn missing_field_is_rejected() {
        let types = mail_types();
        let empty = HashMap::new();
        assert!(matches!(
            hash_struct(&types, "Person", &empty),
            Err(Eip712Error::MissingField { .. })
        ));
    }
}
