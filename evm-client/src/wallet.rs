//! Minimal BIP-32/39/44 HD wallet (spec §1 external collaborator list).
//! Derives keys; all curve math is delegated to `libsecp256k1` rather than
//! reimplemented, matching the teacher's own reliance on that crate for
//! signing.

use hmac::{Hmac, Mac};
use libsecp256k1::{PublicKey, SecretKey};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;

use crate::error::{ProviderError, ProviderResult};

type HmacSha512 = Hmac<Sha512>;

/// Ethereum's standard derivation path prefix: `m/44'/60'/0'/0/{index}`.
pub const ETH_DERIVATION_PURPOSE: u32 = 44;
pub const ETH_DERIVATION_COIN_TYPE: u32 = 60;
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// BIP-39: stretches a mnemonic (already validated by the caller) and an
/// optional passphrase into a 64-byte seed via PBKDF2-HMAC-SHA512.
pub fn mnemonic_to_seed(mnemonic: &str, passphrase: &str) -> [u8; 64] {
    let salt = format!("mnemonic{passphrase}");
    let mut seed = [0u8; 64];
    pbkdf2_hmac::<Sha512>(mnemonic.as_bytes(), salt.as_bytes(), 2048, &mut seed);
    seed
}

#[derive(Clone)]
pub struct ExtendedKey {
    secret_key: SecretKey,
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// BIP-32 master key: `HMAC-SHA512("Bitcoin seed", seed)`.
    pub fn master(seed: &[u8; 64]) -> ProviderResult<Self> {
        let mut mac = HmacSha512::new_from_slice(b"Bitcoin seed")
            .map_err(|e| ProviderError::ProtocolError(e.to_string()))?;
        mac.update(seed);
        let result = mac.finalize().into_bytes();
        let (key_bytes, chain_code_bytes) = result.split_at(32);
        let secret_key = SecretKey::parse_slice(key_bytes)
            .map_err(|e| ProviderError::ProtocolError(format!("invalid master key: {e:?}")))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(chain_code_bytes);
        Ok(Self {
            secret_key,
            chain_code,
        })
    }

    /// Derives a single child key. `index >= 0x8000_0000` requests a
    /// hardened child.
    pub fn derive_child(&self, index: u32) -> ProviderResult<Self> {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| ProviderError::ProtocolError(e.to_string()))?;
        if index >= HARDENED_OFFSET {
            mac.update(&[0u8]);
            mac.update(&self.secret_key.serialize());
        } else {
            let public_key = PublicKey::from_secret_key(&self.secret_key);
            mac.update(&public_key.serialize_compressed());
        }
        mac.update(&index.to_be_bytes());
        let result = mac.finalize().into_bytes();
        let (il, chain_code_bytes) = result.split_at(32);

        let mut child_key_bytes = self.secret_key.serialize();
        let il_key = SecretKey::parse_slice(il)
            .map_err(|e| ProviderError::ProtocolError(format!("invalid child tweak: {e:?}")))?;
        let mut child_secret = SecretKey::parse_slice(&child_key_bytes)
            .map_err(|e| ProviderError::ProtocolError(format!("{e:?}")))?;
        child_secret
            .tweak_add_assign(&il_key)
            .map_err(|e| ProviderError::ProtocolError(format!("child key derivation failed: {e:?}")))?;
        child_key_bytes.copy_from_slice(&child_secret.serialize());

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(chain_code_bytes);
        Ok(Self {
            secret_key: child_secret,
            chain_code,
        })
    }

    /// Derives `m/44'/60'/0'/0/{index}`, the standard Ethereum path
    /// (BIP-44).
    pub fn derive_eth_account(seed: &[u8; 64], index: u32) -> ProviderResult<Self> {
        let master = Self::master(seed)?;
        master
            .derive_child(ETH_DERIVATION_PURPOSE + HARDENED_OFFSET)?
            .derive_child(ETH_DERIVATION_COIN_TYPE + HARDENED_OFFSET)?
            .derive_child(HARDENED_OFFSET) // account 0'
            .and_then(|k| k.derive_child(0)) // change 0 (external)
            .and_then(|k| k.derive_child(index))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn address(&self) -> [u8; 20] {
        let public_key = PublicKey::from_secret_key(&self.secret_key);
        let uncompressed = public_key.serialize();
        let hash = crate::abi::keccak256(&uncompressed[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_derivation_is_deterministic() {
        let a = mnemonic_to_seed("abandon abandon abandon", "");
        let b = mnemonic_to_seed("abandon abandon abandon", "");
        assert_eq!(a, b);
    }

    #[test]
    fn different_indices_derive_different_addresses() {
        let seed = mnemonic_to_seed("test mnemonic phrase", "");
        let account0 = ExtendedKey::derive_eth_account(&seed, 0).unwrap();
        let account1 = ExtendedKey::derive_eth_account(&seed, 1).unwrap();
        assert_ne!(account0.address(), account1.address());
    }

    #[test]
    fn same_seed_and_index_derive_the_same_address() {
        let seed = mnemonic_to_seed("test mnemonic phrase", "");
        let a = ExtendedKey::derive_eth_account(&seed, 3).unwrap();
        let b = ExtendedKey::derive_eth_account(&seed, 3).unwrap();
        assert_eq!(a.address(), b.address());
    }
}
