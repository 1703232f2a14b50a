//! # Key Derivation
//!
//! Purpose-tagged HMAC-SHA-256 that binds a base key to everything the
//! encrypted object commits to:
//!
//! ```text
//! HMAC-SHA256(
//!     key  = base_key,
//!     msg  = purpose ‖ share_1 ‖ … ‖ share_n ‖ be32(threshold) ‖ sorted(service_ids)
//! )
//! ```
//!
//! Service ids are sorted before hashing. Encryption and decryption may list
//! servers in different orders and must still arrive at the same key.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Size of every derived key in bytes
pub const DERIVED_KEY_SIZE: usize = 32;

/// Domain separation tag for derived keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyPurpose {
    /// Key for the data encapsulation mechanism
    Dem = 0,
    /// Key masking the encrypted randomness
    EncryptedRandomness = 1,
    /// Reserved for per-share masks
    ShareMask = 2,
}

/// Derive a purpose-specific key from the base key.
pub fn derive_key(
    purpose: KeyPurpose,
    base_key: &[u8],
    encrypted_shares: &[Vec<u8>],
    threshold: u8,
    services: &[String],
) -> Result<[u8; DERIVED_KEY_SIZE]> {
    let mut mac = HmacSha256::new_from_slice(base_key)
        .map_err(|e| Error::InvalidKey(format!("HMAC key rejected: {}", e)))?;

    mac.update(&[purpose as u8]);
    for share in encrypted_shares {
        mac.update(share);
    }
    mac.update(&u32::from(threshold).to_be_bytes());

    let mut sorted: Vec<&str> = services.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    for service in sorted {
        mac.update(service.as_bytes());
    }

    Ok(mac.finalize().into_bytes().into())
}

/// SHA-256 over the concatenation of `parts`
pub fn digest(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Mask applied to the share a key server is responsible for.
///
/// `SHA-256(public_key ‖ full_id ‖ share_index)`. A key server hands this
/// value back for `full_id` once the caller is authorized.
pub fn share_mask(public_key: &[u8], full_id: &str, share_index: u8) -> [u8; 32] {
    digest(&[public_key, full_id.as_bytes(), &[share_index]])
}

// ============================================================================
// TESTS
// ============================================================================
