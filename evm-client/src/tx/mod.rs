//! Typed transaction builders: Legacy (EIP-155), EIP-1559, and EIP-4844
//! (spec §4 supplement, grounded on the teacher's `tx.rs`).

pub mod gas;

use crate::abi::keccak256;
use crate::error::{ProviderError, ProviderResult};
use crate::rlp::{encode_list, encode_string, encode_u64, encode_unsigned};

/// A 20-byte Ethereum address.
pub type Address = [u8; 20];
/// A 32-byte hash (transaction hash, storage key, blob versioned hash, ...).
pub type Hash = [u8; 32];

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StorageKey(pub [u8; 32]);

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<StorageKey>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct AccessList(pub Vec<AccessListItem>);

impl AccessList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    fn rlp_encode(&self) -> Vec<u8> {
        let items: Vec<Vec<u8>> = self
            .0
            .iter()
            .map(|item| {
                let keys: Vec<Vec<u8>> = item
                    .storage_keys
                    .iter()
                    .map(|k| encode_string(&k.0))
                    .collect();
                encode_list(&[encode_string(&item.address), encode_list(&keys)])
            })
            .collect();
        encode_list(&items)
    }
}

const EIP1559_TX_TYPE: u8 = 0x02;
const EIP4844_TX_TYPE: u8 = 0x03;
const EIP155_V_OFFSET: u64 = 35;

/// A legacy (pre-EIP-2718) transaction, signed with the EIP-155 `v` scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransactionRequest {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: Vec<u8>,
    pub gas_limit: u64,
    pub destination: Option<Address>,
    pub amount: Vec<u8>,
    pub data: Vec<u8>,
}

impl LegacyTransactionRequest {
    fn rlp_fields(&self, chain_id_for_v: Option<u64>) -> Vec<Vec<u8>> {
        let mut fields = vec![
            encode_u64(self.nonce),
            encode_unsigned(&self.gas_price),
            encode_u64(self.gas_limit),
            encode_string(self.destination.map(|a| a.to_vec()).unwrap_or_default().as_slice()),
            encode_unsigned(&self.amount),
            encode_string(&self.data),
        ];
        if let Some(chain_id) = chain_id_for_v {
            fields.push(encode_u64(chain_id));
            fields.push(encode_string(&[]));
            fields.push(encode_string(&[]));
        }
        fields
    }

    /// The EIP-155 signing hash: the transaction fields with `(chainId, 0,
    /// 0)` appended in place of the signature, per spec Open Question
    /// decision to require `v >= 35` on decode.
    pub fn signing_hash(&self) -> Hash {
        let encoded = encode_list(&self.rlp_fields(Some(self.chain_id)));
        keccak256(&encoded)
    }

    pub fn into_signed(self, signature: EcdsaSignature) -> SignedLegacyTransactionRequest {
        let v = self.chain_id * 2 + EIP155_V_OFFSET + signature.y_parity as u64;
        SignedLegacyTransactionRequest {
            transaction: self,
            v,
            r: signature.r,
            s: signature.s,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedLegacyTransactionRequest {
    pub transaction: LegacyTransactionRequest,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl SignedLegacyTransactionRequest {
    /// Encodes the signed envelope, refusing any `v` that isn't a valid
    /// EIP-155 value (spec §3 invariant, §8 "Legacy `v` validation": `v ∈
    /// {0,1,27,28}` is rejected, `v >= 35` succeeds). `v`/`r`/`s` are public
    /// fields so a caller can construct this struct directly rather than via
    /// [`LegacyTransactionRequest::into_signed`]; this check is what actually
    /// enforces the invariant regardless of construction path.
    pub fn raw_bytes(&self) -> ProviderResult<Vec<u8>> {
        if self.v < EIP155_V_OFFSET {
            return Err(ProviderError::ProtocolError(format!(
                "legacy transaction v must be >= {EIP155_V_OFFSET} (EIP-155); got {}",
                self.v
            )));
        }
        let mut fields = self.transaction.rlp_fields(None);
        fields.push(encode_u64(self.v));
        fields.push(encode_unsigned(&self.r));
        fields.push(encode_unsigned(&self.s));
        Ok(encode_list(&fields))
    }

    pub fn hash(&self) -> ProviderResult<Hash> {
        Ok(keccak256(&self.raw_bytes()?))
    }
}

/// An EIP-1559 (type `0x02`) transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eip1559TransactionRequest {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: Vec<u8>,
    pub max_fee_per_gas: Vec<u8>,
    pub gas_limit: u64,
    pub destination: Option<Address>,
    pub amount: Vec<u8>,
    pub data: Vec<u8>,
    pub access_list: AccessList,
}

impl Eip1559TransactionRequest {
    pub fn transaction_type(&self) -> u8 {
        EIP1559_TX_TYPE
    }

    fn rlp_fields(&self) -> Vec<Vec<u8>> {
        vec![
            encode_u64(self.chain_id),
            encode_u64(self.nonce),
            encode_unsigned(&self.max_priority_fee_per_gas),
            encode_unsigned(&self.max_fee_per_gas),
            encode_u64(self.gas_limit),
            encode_string(self.destination.map(|a| a.to_vec()).unwrap_or_default().as_slice()),
            encode_unsigned(&self.amount),
            encode_string(&self.data),
            self.access_list.rlp_encode(),
        ]
    }

    pub fn signing_hash(&self) -> Hash {
        let mut bytes = vec![self.transaction_type()];
        bytes.extend_from_slice(&encode_list(&self.rlp_fields()));
        keccak256(&bytes)
    }

    pub fn into_signed(self, signature: EcdsaSignature) -> SignedEip1559TransactionRequest {
        let hash = {
            let mut bytes = vec![EIP1559_TX_TYPE];
            let mut fields = self.rlp_fields();
            fields.push(encode_string(&[signature.y_parity as u8]));
            fields.push(encode_unsigned(&signature.r));
            fields.push(encode_unsigned(&signature.s));
            bytes.extend_from_slice(&encode_list(&fields));
            keccak256(&bytes)
        };
        SignedEip1559TransactionRequest {
            transaction: self,
            signature,
            memoized_hash: hash,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedEip1559TransactionRequest {
    pub transaction: Eip1559TransactionRequest,
    pub signature: EcdsaSignature,
    memoized_hash: Hash,
}

impl SignedEip1559TransactionRequest {
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut fields = self.transaction.rlp_fields();
        fields.push(encode_string(&[self.signature.y_parity as u8]));
        fields.push(encode_unsigned(&self.signature.r));
        fields.push(encode_unsigned(&self.signature.s));
        let mut out = vec![EIP1559_TX_TYPE];
        out.extend_from_slice(&encode_list(&fields));
        out
    }

    pub fn hash(&self) -> Hash {
        self.memoized_hash
    }

    pub fn raw_transaction_hex(&self) -> String {
        crate::hex::encode(&self.raw_bytes(), true)
    }
}

/// An EIP-4844 (type `0x03`) blob-carrying transaction. Blob KZG
/// commitments/proofs are supplied by the caller (see [`crate::kzg`]); this
/// struct only carries the versioned hashes that go on-chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eip4844TransactionRequest {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: Vec<u8>,
    pub max_fee_per_gas: Vec<u8>,
    pub gas_limit: u64,
    pub destination: Address,
    pub amount: Vec<u8>,
    pub data: Vec<u8>,
    pub access_list: AccessList,
    pub max_fee_per_blob_gas: Vec<u8>,
    pub blob_versioned_hashes: Vec<Hash>,
}

impl Eip4844TransactionRequest {
    pub fn transaction_type(&self) -> u8 {
        EIP4844_TX_TYPE
    }

    fn rlp_fields(&self) -> Vec<Vec<u8>> {
        let blob_hashes: Vec<Vec<u8>> = self
            .blob_versioned_hashes
            .iter()
            .map(|h| encode_string(h))
            .collect();
        vec![
            encode_u64(self.chain_id),
            encode_u64(self.nonce),
            encode_unsigned(&self.max_priority_fee_per_gas),
            encode_unsigned(&self.max_fee_per_gas),
            encode_u64(self.gas_limit),
            encode_string(&self.destination),
            encode_unsigned(&self.amount),
            encode_string(&self.data),
            self.access_list.rlp_encode(),
            encode_unsigned(&self.max_fee_per_blob_gas),
            encode_list(&blob_hashes),
        ]
    }

    pub fn signing_hash(&self) -> Hash {
        let mut bytes = vec![self.transaction_type()];
        bytes.extend_from_slice(&encode_list(&self.rlp_fields()));
        keccak256(&bytes)
    }

    pub fn into_signed(self, signature: EcdsaSignature) -> SignedEip4844TransactionRequest {
        SignedEip4844TransactionRequest {
            transaction: self,
            signature,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedEip4844TransactionRequest {
    pub transaction: Eip4844TransactionRequest,
    pub signature: EcdsaSignature,
}

impl SignedEip4844TransactionRequest {
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut fields = self.transaction.rlp_fields();
        fields.push(encode_string(&[self.signature.y_parity as u8]));
        fields.push(encode_unsigned(&self.signature.r));
        fields.push(encode_unsigned(&self.signature.s));
        let mut out = vec![EIP4844_TX_TYPE];
        out.extend_from_slice(&encode_list(&fields));
        out
    }

    pub fn hash(&self) -> Hash {
        keccak256(&self.raw_bytes())
    }
}

/// A recoverable ECDSA signature over a transaction's signing hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub y_parity: bool,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signature() -> EcdsaSignature {
        EcdsaSignature {
            y_parity: false,
            r: [0x11; 32],
            s: [0x22; 32],
        }
    }

    #[test]
    fn legacy_v_uses_eip155_scheme() {
        let tx = LegacyTransactionRequest {
            chain_id: 1,
            nonce: 0,
            gas_price: 1_000_000_000u64.to_be_bytes().to_vec(),
            gas_limit: 21_000,
            destination: Some([0xaa; 20]),
            amount: 0u64.to_be_bytes().to_vec(),
            data: vec![],
        };
        let signed = tx.into_signed(sample_signature());
        assert_eq!(signed.v, 1 * 2 + 35);
        assert!(signed.raw_bytes().is_ok());
    }

    #[test]
    fn legacy_raw_bytes_rejects_pre_eip155_v_values() {
        let tx = LegacyTransactionRequest {
            chain_id: 1,
            nonce: 0,
            gas_price: 1_000_000_000u64.to_be_bytes().to_vec(),
            gas_limit: 21_000,
            destination: Some([0xaa; 20]),
            amount: 0u64.to_be_bytes().to_vec(),
            data: vec![],
        };
        for rejected_v in [0u64, 1, 27, 28] {
            let signed = SignedLegacyTransactionRequest {
                transaction: tx.clone(),
                v: rejected_v,
                r: [0x11; 32],
                s: [0x22; 32],
            };
            assert!(signed.raw_bytes().is_err(), "v={rejected_v} should be rejected");
            assert!(signed.hash().is_err());
        }
        let accepted = SignedLegacyTransactionRequest {
            transaction: tx,
            v: 35,
            r: [0x11; 32],
            s: [0x22; 32],
        };
        assert!(accepted.raw_bytes().is_ok());
    }

    #[test]
    fn eip1559_prefixes_raw_bytes_with_type_byte() {
        let tx = Eip1559TransactionRequest {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: 1u64.to_be_bytes().to_vec(),
            max_fee_per_gas: 2u64.to_be_bytes().to_vec(),
            gas_limit: 21_000,
            destination: Some([0xbb; 20]),
            amount: vec![],
            data: vec![],
            access_list: AccessList::new(),
        };
        let signed = tx.into_signed(sample_signature());
        let raw = signed.raw_bytes();
        assert_eq!(raw[0], EIP1559_TX_TYPE);
    }

    #[test]
    fn eip1559_hash_is_memoized_and_consistent() {
        let tx = Eip1559TransactionRequest {
            chain_id: 5,
            nonce: 3,
            max_priority_fee_per_gas: vec![1],
            max_fee_per_gas: vec![2],
            gas_limit: 50_000,
            destination: None,
            amount: vec![],
            data: vec![0xde, 0xad, 0xbe, 0xef],
            access_list: AccessList::new(),
        };
        let signed = tx.into_signed(sample_signature());
        assert_eq!(signed.hash(), keccak256(&signed.raw_bytes()));
    }
}
