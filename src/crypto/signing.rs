//! # Ed25519 Signing
//!
//! Ephemeral keypairs and signatures used by session keys: the certificate
//! is self-signed with the session keypair, and every key-fetch request
//! signs the caller's authorization bytes with the same key.
//!
//! ```text
//! SessionKey::new ──► SigningKeyPair::generate()
//!                         │
//!                         ├──► sign(certificate payload) ──► Certificate.signature
//!                         │
//!                         └──► sign(tx_bytes)            ──► RequestParams.signature
//! ```

use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Size of Ed25519 secret and public keys in bytes
pub const ED25519_KEY_SIZE: usize = 32;

/// An Ed25519 signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Create from a slice (must be exactly 64 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; SIGNATURE_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "Signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

/// Ed25519 signing keypair
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)] // ed25519_dalek::SigningKey handles its own zeroization
    secret: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random keypair from the OS RNG
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild from raw secret bytes (must be exactly 32 bytes)
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; ED25519_KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "Secret key must be {} bytes, got {}",
                ED25519_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self {
            secret: SigningKey::from_bytes(&bytes),
        })
    }

    /// Raw secret key bytes. Only for export; never log these.
    pub fn secret_bytes(&self) -> [u8; ED25519_KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Public key bytes
    pub fn public_bytes(&self) -> [u8; ED25519_KEY_SIZE] {
        self.secret.verifying_key().to_bytes()
    }
}

/// Sign a message. Ed25519 signatures are deterministic.
pub fn sign(keypair: &SigningKeyPair, message: &[u8]) -> Signature {
    Signature(keypair.secret.sign(message).to_bytes())
}

/// Verify a signature against a raw 32-byte public key
pub fn verify(public_key: &[u8], message: &[u8], signature: &Signature) -> Result<()> {
    let public_key: [u8; ED25519_KEY_SIZE] = public_key
        .try_into()
        .map_err(|_| Error::InvalidKey(format!("Public key must be {} bytes", ED25519_KEY_SIZE)))?;
    let verifying_key = VerifyingKey::from_bytes(&public_key)
        .map_err(|e| Error::InvalidKey(format!("Invalid public key: {}", e)))?;

    verifying_key
        .verify(message, &Ed25519Signature::from_bytes(&signature.0))
        .map_err(|_| Error::VerificationFailed)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = SigningKeyPair::generate();
        let signature = sign(&keypair, b"tx bytes");
        assert!(verify(&keypair.public_bytes(), b"tx bytes", &signature).is_ok());
    }

    #[test]
    fn test_verify_wrong_message_fails() {
        let keypair = SigningKeyPair::generate();
        let signature = sign(&keypair, b"tx bytes");
        assert_eq!(
            verify(&keypair.public_bytes(), b"other bytes", &signature),
            Err(Error::VerificationFailed)
        );
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let alice = SigningKeyPair::generate();
        let bob = SigningKeyPair::generate();
        let signature = sign(&alice, b"tx bytes");
        assert!(verify(&bob.public_bytes(), b"tx bytes", &signature).is_err());
    }

    #[test]
    fn test_keypair_from_secret_bytes() {
        let keypair = SigningKeyPair::generate();
        let restored = SigningKeyPair::from_slice(&keypair.secret_bytes()).unwrap();
        assert_eq!(restored.public_bytes(), keypair.public_bytes());
        assert!(SigningKeyPair::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_signature_from_slice_length() {
        assert!(Signature::from_slice(&[0u8; 64]).is_ok());
        assert!(Signature::from_slice(&[0u8; 63]).is_err());
    }
}
