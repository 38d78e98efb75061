//! Transaction signer abstraction (spec supplement). The teacher's
//! `tx.rs::sign` signs via a canister-held ECDSA key; this generalizes the
//! same recover-and-verify pattern behind a trait so callers can also plug
//! in HSM- or vault-backed signers.

use async_trait::async_trait;
use libsecp256k1::{recover, sign, verify, Message, PublicKey, RecoveryId, SecretKey, Signature};

use crate::error::{ProviderError, ProviderResult};
use crate::tx::EcdsaSignature;

/// Anything that can produce a recoverable ECDSA signature over a 32-byte
/// digest and report its own address.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign_digest(&self, digest: &[u8; 32]) -> ProviderResult<EcdsaSignature>;
    fn address(&self) -> [u8; 20];
}

/// A signer backed by an in-memory secp256k1 private key.
pub struct LocalSigner {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: [u8; 20],
}

impl LocalSigner {
    pub fn from_secret_key_bytes(bytes: &[u8; 32]) -> ProviderResult<Self> {
        let secret_key = SecretKey::parse(bytes)
            .map_err(|e| ProviderError::ProtocolError(format!("invalid secret key: {e:?}")))?;
        let public_key = PublicKey::from_secret_key(&secret_key);
        let address = address_from_public_key(&public_key);
        Ok(Self {
            secret_key,
            public_key,
            address,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign_digest(&self, digest: &[u8; 32]) -> ProviderResult<EcdsaSignature> {
        let message = Message::parse(digest);
        let (signature, recovery_id) = sign(&message, &self.secret_key);
        debug_assert!(verify(&message, &signature, &self.public_key));
        let r_bytes = signature.r.b32();
        let s_bytes = signature.s.b32();
        Ok(EcdsaSignature {
            y_parity: recovery_id.serialize() == 1,
            r: r_bytes,
            s: s_bytes,
        })
    }

    fn address(&self) -> [u8; 20] {
        self.address
    }
}

/// Determines which of the two recovery candidates matches `public_key`,
/// mirroring the teacher's `determine_signature_y_parity`.
pub fn determine_y_parity(
    public_key: &PublicKey,
    digest: &[u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
) -> Option<bool> {
    let message = Message::parse(digest);
    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r);
    sig_bytes[32..].copy_from_slice(s);
    let signature = Signature::parse_standard_slice(&sig_bytes).ok()?;
    for candidate in 0..=1 {
        let recovery_id = RecoveryId::parse(candidate).ok()?;
        if let Ok(recovered) = recover(&message, &signature, &recovery_id) {
            if &recovered == public_key {
                return Some(candidate == 1);
            }
        }
    }
    None
}

fn address_from_public_key(public_key: &PublicKey) -> [u8; 20] {
    let uncompressed = public_key.serialize(); // 65 bytes: 0x04 || X || Y
    let hash = crate::abi::keccak256(&uncompressed[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_signer_produces_verifiable_signature() {
        let signer = LocalSigner::from_secret_key_bytes(&[0x11; 32]).unwrap();
        let digest = crate::abi::keccak256(b"hello world");
        let signature = signer.sign_digest(&digest).await.unwrap();
        let parity =
            determine_y_parity(&signer.public_key(), &digest, &signature.r, &signature.s);
        assert_eq!(parity, Some(signature.y_parity));
    }

    #[test]
    fn address_is_deterministic_for_a_given_key() {
        let signer_a = LocalSigner::from_secret_key_bytes(&[0x42; 32]).unwrap();
        let signer_b = LocalSigner::from_secret_key_bytes(&[0x42; 32]).unwrap();
        assert_eq!(signer_a.address(), signer_b.address());
    }
}
