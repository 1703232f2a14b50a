//! # Data Encapsulation
//!
//! The payload is protected by one of two authenticated symmetric schemes,
//! keyed by the threshold-derived DEM key:
//!
//! | Strategy      | Key  | Nonce/IV | Envelope                          |
//! |---------------|------|----------|-----------------------------------|
//! | AES-256-GCM   | 32 B | 12 B     | `{nonce, ciphertext‖tag, aad?}`   |
//! | HMAC-then-CTR | 32 B | 16 B     | `{iv, ciphertext, aad?, mac}`     |
//!
//! The set is closed: encryption produces exactly one [`Ciphertext`] variant
//! and [`decrypt`] dispatches on it.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::object::{Aes256GcmCiphertext, Ciphertext, Hmac256CtrCiphertext};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Size of a DEM key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const GCM_NONCE_SIZE: usize = 12;

/// Size of the CTR initial counter block in bytes
pub const CTR_IV_SIZE: usize = 16;

/// Selects the data encapsulation scheme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DemType {
    /// AES-256-GCM
    #[default]
    Aes256Gcm,
    /// AES-256-CTR authenticated with HMAC-SHA256
    Hmac256Ctr,
}

/// A payload bound to the scheme that will encrypt it
#[derive(Clone, Copy, Debug)]
pub enum DemStrategy<'a> {
    /// AES-256-GCM
    Aes256Gcm {
        /// Plaintext
        data: &'a [u8],
        /// Additional authenticated data
        aad: &'a [u8],
    },
    /// AES-256-CTR + HMAC-SHA256
    Hmac256Ctr {
        /// Plaintext
        data: &'a [u8],
        /// Additional authenticated data
        aad: &'a [u8],
    },
}

impl<'a> DemStrategy<'a> {
    /// Bind `data` and `aad` to the scheme named by `dem_type`
    pub fn new(dem_type: DemType, data: &'a [u8], aad: &'a [u8]) -> Self {
        match dem_type {
            DemType::Aes256Gcm => DemStrategy::Aes256Gcm { data, aad },
            DemType::Hmac256Ctr => DemStrategy::Hmac256Ctr { data, aad },
        }
    }

    /// Generate a fresh random key for this scheme
    pub fn generate_key(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut key[..]);
        key
    }

    /// Encrypt the bound payload under `key`
    pub fn encrypt(&self, key: &[u8; KEY_SIZE]) -> Result<Ciphertext> {
        match *self {
            DemStrategy::Aes256Gcm { data, aad } => aes_gcm_encrypt(key, data, aad),
            DemStrategy::Hmac256Ctr { data, aad } => hmac_ctr_encrypt(key, data, aad),
        }
    }
}

/// Decrypt whichever envelope `ciphertext` holds
pub fn decrypt(key: &[u8; KEY_SIZE], ciphertext: &Ciphertext) -> Result<Vec<u8>> {
    match ciphertext {
        Ciphertext::Aes256Gcm(ct) => aes_gcm_decrypt(key, ct),
        Ciphertext::Hmac256Ctr(ct) => hmac_ctr_decrypt(key, ct),
    }
}

impl Ciphertext {
    /// Decrypt this envelope under `key`
    pub fn decrypt(&self, key: &[u8; KEY_SIZE]) -> Result<Vec<u8>> {
        decrypt(key, self)
    }
}

fn optional_aad(aad: &[u8]) -> Option<Vec<u8>> {
    if aad.is_empty() {
        None
    } else {
        Some(aad.to_vec())
    }
}

// ============================================================================
// AES-256-GCM
// ============================================================================

fn aes_gcm_encrypt(key: &[u8; KEY_SIZE], data: &[u8], aad: &[u8]) -> Result<Ciphertext> {
    let mut nonce = [0u8; GCM_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;
    let sealed = cipher
        .encrypt(AesNonce::from_slice(&nonce), Payload { msg: data, aad })
        .map_err(|e| Error::EncryptionFailed(format!("AES-GCM: {}", e)))?;

    Ok(Ciphertext::Aes256Gcm(Aes256GcmCiphertext {
        nonce: nonce.to_vec(),
        ciphertext: sealed,
        aad: optional_aad(aad),
    }))
}

/// Open an AES-256-GCM envelope
pub fn aes_gcm_decrypt(key: &[u8; KEY_SIZE], ct: &Aes256GcmCiphertext) -> Result<Vec<u8>> {
    if ct.nonce.len() != GCM_NONCE_SIZE {
        return Err(Error::InvalidCiphertext(format!(
            "AES-GCM nonce must be {} bytes, got {}",
            GCM_NONCE_SIZE,
            ct.nonce.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key: {}", e)))?;
    let payload = Payload {
        msg: &ct.ciphertext,
        aad: ct.aad.as_deref().unwrap_or_default(),
    };

    cipher
        .decrypt(AesNonce::from_slice(&ct.nonce), payload)
        .map_err(|_| Error::DecryptionFailed("authentication tag mismatch".into()))
}

// ============================================================================
// HMAC-SHA256 + AES-256-CTR
// ============================================================================

fn ctr_mac(key: &[u8; KEY_SIZE], iv: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| Error::InvalidKey(format!("HMAC key rejected: {}", e)))?;
    mac.update(iv);
    mac.update(aad);
    mac.update(ciphertext);
    Ok(mac)
}

fn apply_ctr(key: &[u8; KEY_SIZE], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let mut cipher = Aes256Ctr::new_from_slices(key, iv)
        .map_err(|e| Error::InvalidCiphertext(format!("CTR parameters rejected: {}", e)))?;
    cipher.apply_keystream(buf);
    Ok(())
}

fn hmac_ctr_encrypt(key: &[u8; KEY_SIZE], data: &[u8], aad: &[u8]) -> Result<Ciphertext> {
    let mut iv = [0u8; CTR_IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut ciphertext = data.to_vec();
    apply_ctr(key, &iv, &mut ciphertext)?;

    let mac = ctr_mac(key, &iv, aad, &ciphertext)?
        .finalize()
        .into_bytes()
        .to_vec();

    Ok(Ciphertext::Hmac256Ctr(Hmac256CtrCiphertext {
        iv: iv.to_vec(),
        ciphertext,
        aad: optional_aad(aad),
        mac,
    }))
}

/// Open an HMAC-then-CTR envelope.
///
/// The tag is checked before any keystream is applied; a mismatch returns
/// [`Error::InvalidMac`] and no plaintext.
pub fn hmac_ctr_decrypt(key: &[u8; KEY_SIZE], ct: &Hmac256CtrCiphertext) -> Result<Vec<u8>> {
    if ct.iv.len() != CTR_IV_SIZE {
        return Err(Error::InvalidCiphertext(format!(
            "CTR IV must be {} bytes, got {}",
            CTR_IV_SIZE,
            ct.iv.len()
        )));
    }

    ctr_mac(
        key,
        &ct.iv,
        ct.aad.as_deref().unwrap_or_default(),
        &ct.ciphertext,
    )?
    .verify_slice(&ct.mac)
    .map_err(|_| Error::InvalidMac)?;

    let mut plaintext = ct.ciphertext.clone();
    apply_ctr(key, &ct.iv, &mut plaintext)?;
    Ok(plaintext)
}

// ============================================================================
// TESTS
// ============================================================================
