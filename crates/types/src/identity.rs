//! Attestor identities.
//!
//! An attestor is the account authorized to produce state transitions on the
//! anchor. It is identified by the BLAKE3 digest of its Ed25519 public key.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use sbor::prelude::*;
use std::fmt;
use thiserror::Error;

/// Account identifier derived from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Derive the account id owning `public_key`.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        AccountId(*blake3::hash(public_key).as_bytes())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

/// Signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signature must be 64 bytes, got {0}")]
    InvalidLength(usize),

    #[error("signature does not match message")]
    Mismatch,

    #[error("invalid seed: {0}")]
    InvalidSeed(String),
}

/// An Ed25519 signature together with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct AttestorSignature {
    pub public_key: [u8; 32],
    pub signature: Vec<u8>,
}

impl AttestorSignature {
    /// Account that produced this signature.
    pub fn signer(&self) -> AccountId {
        AccountId::from_public_key(&self.public_key)
    }

    /// Check the signature over `message`.
    pub fn verify(&self, message: &[u8]) -> Result<(), SignatureError> {
        let key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|_| SignatureError::InvalidPublicKey)?;
        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidLength(self.signature.len()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&bytes);
        key.verify(message, &signature)
            .map_err(|_| SignatureError::Mismatch)
    }
}

/// Ed25519 signing key of an attestor.
#[derive(Clone)]
pub struct AttestorKey {
    inner: SigningKey,
}

impl AttestorKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: SigningKey::from_bytes(seed),
        }
    }

    /// Deterministic key from a hex-encoded 32-byte seed.
    pub fn from_hex_seed(seed: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(seed.trim_start_matches("0x"))
            .map_err(|e| SignatureError::InvalidSeed(e.to_string()))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SignatureError::InvalidSeed(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.inner.verifying_key().to_bytes()
    }

    pub fn account_id(&self) -> AccountId {
        AccountId::from_public_key(&self.public_key())
    }

    /// Sign `message`.
    pub fn sign(&self, message: &[u8]) -> AttestorSignature {
        AttestorSignature {
            public_key: self.public_key(),
            signature: self.inner.sign(message).to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for AttestorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttestorKey({})", self.account_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = AttestorKey::from_seed(&[7u8; 32]);
        let sig = key.sign(b"payload");
        assert_eq!(sig.signer(), key.account_id());
        assert!(sig.verify(b"payload").is_ok());
        assert_eq!(sig.verify(b"other"), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let key = AttestorKey::generate();
        let mut sig = key.sign(b"payload");
        sig.signature.truncate(10);
        assert_eq!(sig.verify(b"payload"), Err(SignatureError::InvalidLength(10)));
    }

    #[test]
    fn test_hex_seed_is_deterministic() {
        let a = AttestorKey::from_hex_seed(&hex::encode([3u8; 32])).unwrap();
        let b = AttestorKey::from_seed(&[3u8; 32]);
        assert_eq!(a.account_id(), b.account_id());
        assert!(AttestorKey::from_hex_seed("0x1234").is_err());
    }
}
