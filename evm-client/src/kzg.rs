//! EIP-4844 blob versioned hashes (spec §6, Glossary "Versioned hash").
//!
//! Full KZG commitment and proof computation is an external BLS/KZG
//! collaborator (spec §1) and out of scope here; this module only derives
//! the versioned hash a signed blob transaction embeds, given a
//! caller-supplied 48-byte KZG commitment.

use sha2::{Digest, Sha256};

use crate::error::{ProviderError, ProviderResult};
use crate::tx::Hash;

pub const KZG_COMMITMENT_LEN: usize = 48;
pub const VERSIONED_HASH_VERSION: u8 = 0x01;
/// Spec invariant: an EIP-4844 transaction carries between one and six blobs.
pub const MAX_BLOBS_PER_TRANSACTION: usize = 6;

/// `versioned_hash = 0x01 || sha256(commitment)[1..]` (spec §6).
pub fn versioned_hash_from_commitment(commitment: &[u8]) -> ProviderResult<Hash> {
    if commitment.len() != KZG_COMMITMENT_LEN {
        return Err(ProviderError::ProtocolError(format!(
            "KZG commitment must be {KZG_COMMITMENT_LEN} bytes, got {}",
            commitment.len()
        )));
    }
    let digest = Sha256::digest(commitment);
    let mut hash = [0u8; 32];
    hash[0] = VERSIONED_HASH_VERSION;
    hash[1..].copy_from_slice(&digest[1..]);
    Ok(hash)
}

/// Validates the count and version byte of a blob transaction's versioned
/// hashes per the spec's typed-transaction invariants.
pub fn validate_versioned_hashes(hashes: &[Hash]) -> ProviderResult<()> {
    if hashes.is_empty() || hashes.len() > MAX_BLOBS_PER_TRANSACTION {
        return Err(ProviderError::ProtocolError(format!(
            "blob transaction must carry 1..={MAX_BLOBS_PER_TRANSACTION} versioned hashes, got {}",
            hashes.len()
        )));
    }
    for hash in hashes {
        if hash[0] != VERSIONED_HASH_VERSION {
            return Err(ProviderError::ProtocolError(
                "versioned hash has wrong version byte".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_hash_has_correct_prefix() {
        let commitment = [0x42u8; KZG_COMMITMENT_LEN];
        let hash = versioned_hash_from_commitment(&commitment).unwrap();
        assert_eq!(hash[0], VERSIONED_HASH_VERSION);
    }

    #[test]
    fn wrong_commitment_length_is_rejected() {
        let commitment = [0x42u8; 10];
        assert!(versioned_hash_from_commitment(&commitment).is_err());
    }

    #[test]
    fn validates_blob_count_bounds() {
        assert!(validate_versioned_hashes(&[]).is_err());
        let too_many = vec![[0x01u8; 32]; MAX_BLOBS_PER_TRANSACTION + 1];
        assert!(validate_versioned_hashes(&too_many).is_err());
        let ok = vec![[0x01u8; 32]; 3];
        assert!(validate_versioned_hashes(&ok).is_ok());
    }

    #[test]
    fn rejects_wrong_version_byte() {
        let bad = vec![[0x02u8; 32]];
        assert!(validate_versioned_hashes(&bad).is_err());
    }
}
