//! # Encryption Engine
//!
//! Threshold encryption of a payload for a set of key servers, and the
//! reverse once enough per-server keys have been recovered.
//!
//! ## Encrypt
//!
//! ```text
//! base_key ──split(t, n)──► share_1 .. share_n
//!                               │
//!     share_i ⊕ share_mask(pk_i, full_id, i) ──► encrypted_share_i
//!
//! dem_key = derive_key(Dem, base_key, encrypted_shares, t, object_ids)
//! payload ──DEM(dem_key)──► ciphertext
//! ```
//!
//! ## Decrypt
//!
//! Shares are unmasked in stored `services` order with whatever keys are
//! available, and the first `threshold` recovered shares are combined. A
//! server listed more than once contributes only its first share, since its
//! key is bound to that share's index.
//! With [`DecryptChecks::check_share_consistency`] set, every other
//! recoverable share must also lie on the same polynomial, and the
//! encrypted randomness must open to `digest(base_key ‖ nonce)`.

use std::collections::HashSet;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::cache::KeySource;
use crate::crypto::dem::DemStrategy;
use crate::crypto::kdf::{derive_key, digest, share_mask, KeyPurpose};
use crate::crypto::shamir::{self, Share};
use crate::error::{Error, Result};
use crate::key_server::KeyServer;
use crate::object::{
    BonehFranklinEncryptedShares, EncryptedObject, IbeEncryptions, OBJECT_VERSION,
};
use crate::utils::{create_full_id, xor_unchecked, MAX_U8};

/// Size of the randomness nonce in bytes
pub const NONCE_SIZE: usize = 32;

/// Optional checks performed while decrypting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecryptChecks {
    /// Verify every recoverable share against the reconstructed key
    pub check_share_consistency: bool,
    /// Accepted for API parity; hash masks carry no group encoding to check
    pub check_le_encoding: bool,
}

/// Encrypt under a threshold of `key_servers`.
///
/// `key_servers` is the effective list: a server holding several shares
/// appears once per share. The threshold may not exceed the number of
/// distinct servers. Returns the serialized object and the DEM key.
pub fn encrypt(
    key_servers: &[KeyServer],
    threshold: usize,
    package_id: &str,
    id: &str,
    dem: DemStrategy<'_>,
) -> Result<(Vec<u8>, [u8; 32])> {
    let total = key_servers.len();
    if threshold < 1 || threshold >= total || total >= MAX_U8 {
        return Err(Error::InvalidThreshold(format!(
            "invalid threshold {} for {} key servers",
            threshold, total
        )));
    }
    // Each server unmasks a single share when decrypting
    let distinct = key_servers
        .iter()
        .map(|s| s.object_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    if threshold > distinct {
        return Err(Error::InvalidThreshold(format!(
            "threshold {} exceeds {} distinct key servers",
            threshold, distinct
        )));
    }
    // Bounded by MAX_U8 above
    let threshold_u8 = threshold as u8;

    let base_key = dem.generate_key();
    let shares = shamir::split(&base_key[..], threshold, total)?;

    let full_id = create_full_id(package_id, id);
    let mut encrypted_shares = Vec::with_capacity(total);
    let mut services = Vec::with_capacity(total);
    for (share, server) in shares.iter().zip(key_servers) {
        let mask = share_mask(&server.public_key, &full_id, share.index);
        encrypted_shares.push(xor_unchecked(&share.bytes, &mask));
        services.push((server.object_id.clone(), share.index));
    }
    let object_ids: Vec<String> = key_servers.iter().map(|s| s.object_id.clone()).collect();

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    let randomness = digest(&[&base_key[..], &nonce]);
    let randomness_key = Zeroizing::new(derive_key(
        KeyPurpose::EncryptedRandomness,
        &base_key[..],
        &encrypted_shares,
        threshold_u8,
        &object_ids,
    )?);
    let encrypted_randomness = xor_unchecked(&randomness, &randomness_key[..]);

    let dem_key = derive_key(
        KeyPurpose::Dem,
        &base_key[..],
        &encrypted_shares,
        threshold_u8,
        &object_ids,
    )?;
    let ciphertext = dem.encrypt(&dem_key)?;

    let object = EncryptedObject {
        version: OBJECT_VERSION,
        package_id: package_id.to_string(),
        id: id.to_string(),
        services,
        threshold: threshold_u8,
        encrypted_shares: IbeEncryptions::BonehFranklinBls12381(BonehFranklinEncryptedShares {
            encrypted_shares,
            encrypted_randomness,
            nonce: nonce.to_vec(),
        }),
        ciphertext,
    };

    tracing::debug!(
        "Encrypted {} for {} shares at threshold {}",
        full_id,
        total,
        threshold
    );
    Ok((object.to_bytes()?, dem_key))
}

/// Decrypt `object` with the keys available in `keys`.
pub fn decrypt<K>(object: &EncryptedObject, keys: &K, checks: DecryptChecks) -> Result<Vec<u8>>
where
    K: KeySource + ?Sized,
{
    let IbeEncryptions::BonehFranklinBls12381(ibe) = &object.encrypted_shares;
    if checks.check_le_encoding {
        tracing::debug!("check_le_encoding has no effect for hash-masked shares");
    }

    let threshold = usize::from(object.threshold);
    let full_id = object.full_id();
    let object_ids = object.service_ids();

    let mut recovered: Vec<Share> = Vec::new();
    let mut used = HashSet::new();
    for (i, (object_id, index)) in object.services.iter().enumerate() {
        if !checks.check_share_consistency && recovered.len() >= threshold {
            break;
        }
        // One key per server unmasks only that server's first share
        if !used.insert(object_id.as_str()) {
            continue;
        }
        let Some(key) = keys.key_for(&full_id, object_id) else {
            continue;
        };
        let encrypted = ibe
            .encrypted_shares
            .get(i)
            .ok_or_else(|| Error::InvalidCiphertext("mismatched share count".into()))?;
        if key.len() < encrypted.len() {
            return Err(Error::InvalidKey(format!(
                "key from {} is {} bytes, share is {}",
                object_id,
                key.len(),
                encrypted.len()
            )));
        }
        recovered.push(Share {
            index: *index,
            bytes: xor_unchecked(encrypted, &key),
        });
    }

    if recovered.len() < threshold {
        return Err(Error::NotEnoughShares);
    }

    let (selected, extra) = recovered.split_at(threshold);
    let base_key = Zeroizing::new(shamir::combine(selected)?);

    if checks.check_share_consistency {
        check_consistency(selected, extra, &base_key, ibe, object.threshold, &object_ids)?;
    }

    let dem_key = Zeroizing::new(derive_key(
        KeyPurpose::Dem,
        &base_key,
        &ibe.encrypted_shares,
        object.threshold,
        &object_ids,
    )?);
    object.ciphertext.decrypt(&dem_key)
}

fn check_consistency(
    selected: &[Share],
    extra: &[Share],
    base_key: &[u8],
    ibe: &BonehFranklinEncryptedShares,
    threshold: u8,
    object_ids: &[String],
) -> Result<()> {
    for share in extra {
        if shamir::interpolate_at(selected, share.index)? != share.bytes {
            return Err(Error::InconsistentKeyServers(format!(
                "share {} does not match the reconstructed key",
                share.index
            )));
        }
    }

    let randomness_key = Zeroizing::new(derive_key(
        KeyPurpose::EncryptedRandomness,
        base_key,
        &ibe.encrypted_shares,
        threshold,
        object_ids,
    )?);
    if ibe.encrypted_randomness.len() > randomness_key.len() {
        return Err(Error::InvalidCiphertext(
            "encrypted randomness is too long".into(),
        ));
    }
    let randomness = xor_unchecked(&ibe.encrypted_randomness, &randomness_key[..]);
    if randomness != digest(&[base_key, &ibe.nonce[..]]) {
        return Err(Error::InconsistentKeyServers(
            "encrypted randomness does not match the reconstructed key".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
