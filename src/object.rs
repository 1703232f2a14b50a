//! # Encrypted Object
//!
//! The self-describing wire form of a threshold-encrypted payload.
//!
//! ```text
//! {
//!   "version": 0,
//!   "packageId": "0x2",
//!   "id": "obj-1",
//!   "services": [["0xserverA", 1], ["0xserverB", 2], ...],
//!   "threshold": 2,
//!   "encryptedShares": { "BonehFranklinBLS12381": {
//!       "encryptedShares": [b64, ...], "encryptedRandomness": b64, "nonce": b64 } },
//!   "ciphertext": { "Aes256Gcm": { "nonce": b64, "ciphertext": b64, "aad"?: b64 } }
//!              |  { "Hmac256Ctr": { "iv": b64, "ciphertext": b64, "aad"?: b64, "mac": b64 } }
//! }
//! ```
//!
//! Both one-of unions are closed enums, so exactly one variant is always
//! populated. An object naming any other IBE scheme is rejected as
//! unsupported, and any other ciphertext variant as invalid.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::{base64_bytes, base64_list, base64_opt, create_full_id};

/// Current object format version
pub const OBJECT_VERSION: u8 = 0;

/// Wire tag of the Boneh-Franklin share encryption
const BONEH_FRANKLIN_BLS12381: &str = "BonehFranklinBLS12381";

/// AES-256-GCM envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aes256GcmCiphertext {
    /// 12-byte nonce
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext with the 16-byte tag appended
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Additional authenticated data
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub aad: Option<Vec<u8>>,
}

/// HMAC-then-CTR envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hmac256CtrCiphertext {
    /// 16-byte initial counter block
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    /// CTR ciphertext
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Additional authenticated data
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub aad: Option<Vec<u8>>,
    /// HMAC-SHA256 over `iv ‖ aad ‖ ciphertext`
    #[serde(with = "base64_bytes")]
    pub mac: Vec<u8>,
}

/// Payload envelope produced by a DEM strategy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ciphertext {
    /// AES-256-GCM
    Aes256Gcm(Aes256GcmCiphertext),
    /// HMAC-SHA256 + AES-256-CTR
    Hmac256Ctr(Hmac256CtrCiphertext),
}

/// Masked shares plus the encrypted randomness commitment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonehFranklinEncryptedShares {
    /// One masked Shamir share per entry of `services`
    #[serde(with = "base64_list")]
    pub encrypted_shares: Vec<Vec<u8>>,
    /// `digest(base_key ‖ nonce)` masked with a derived key
    #[serde(with = "base64_bytes")]
    pub encrypted_randomness: Vec<u8>,
    /// 32-byte nonce fed into the randomness digest
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
}

/// IBE scheme used to protect the shares
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbeEncryptions {
    /// The only scheme this client speaks
    #[serde(rename = "BonehFranklinBLS12381")]
    BonehFranklinBls12381(BonehFranklinEncryptedShares),
}

impl IbeEncryptions {
    /// The masked shares, in `services` order
    pub fn encrypted_shares(&self) -> &[Vec<u8>] {
        match self {
            IbeEncryptions::BonehFranklinBls12381(inner) => &inner.encrypted_shares,
        }
    }
}

/// A threshold-encrypted payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedObject {
    /// Format version
    pub version: u8,
    /// Package the identity belongs to
    pub package_id: String,
    /// Inner identity
    pub id: String,
    /// `(object_id, share_index)` per encrypted share
    pub services: Vec<(String, u8)>,
    /// Shares needed to decrypt
    pub threshold: u8,
    /// Masked shares
    pub encrypted_shares: IbeEncryptions,
    /// Encrypted payload
    pub ciphertext: Ciphertext,
}

impl EncryptedObject {
    /// Serialize to the JSON wire form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Parse the JSON wire form.
    ///
    /// An unknown IBE variant is reported as unsupported; anything else
    /// malformed, an unknown ciphertext variant included, is a ciphertext
    /// error.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data).map_err(|e| {
            Error::InvalidCiphertext(format!("cannot parse encrypted object: {}", e))
        })?;

        let unknown_mode = value
            .get("encryptedShares")
            .and_then(serde_json::Value::as_object)
            .and_then(|variants| variants.keys().find(|k| *k != BONEH_FRANKLIN_BLS12381));
        if let Some(mode) = unknown_mode {
            return Err(Error::UnsupportedFeature(format!(
                "encryption mode not supported: {}",
                mode
            )));
        }

        let object: Self = serde_json::from_value(value).map_err(|e| {
            Error::InvalidCiphertext(format!("cannot parse encrypted object: {}", e))
        })?;
        object.validate()?;
        Ok(object)
    }

    /// `{package}:{id}` identity of this object
    pub fn full_id(&self) -> String {
        create_full_id(&self.package_id, &self.id)
    }

    /// Object ids of the services, in stored order
    pub fn service_ids(&self) -> Vec<String> {
        self.services.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Structural checks that do not need any key material
    pub fn validate(&self) -> Result<()> {
        let share_count = self.encrypted_shares.encrypted_shares().len();
        if share_count != self.services.len() {
            return Err(Error::InvalidCiphertext(format!(
                "mismatched share count: {} shares for {} services",
                share_count,
                self.services.len()
            )));
        }
        if self.threshold == 0 || usize::from(self.threshold) > self.services.len() {
            return Err(Error::InvalidCiphertext(format!(
                "threshold {} out of range for {} services",
                self.threshold,
                self.services.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedObject {
        EncryptedObject {
            version: OBJECT_VERSION,
            package_id: "0x2".into(),
            id: "obj-1".into(),
            services: vec![("0xa".into(), 1), ("0xb".into(), 2)],
            threshold: 1,
            encrypted_shares: IbeEncryptions::BonehFranklinBls12381(
                BonehFranklinEncryptedShares {
                    encrypted_shares: vec![vec![1, 2], vec![3, 4]],
                    encrypted_randomness: vec![5; 32],
                    nonce: vec![6; 32],
                },
            ),
            ciphertext: Ciphertext::Hmac256Ctr(Hmac256CtrCiphertext {
                iv: vec![0; 16],
                ciphertext: vec![9, 9],
                aad: None,
                mac: vec![7; 32],
            }),
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json: serde_json::Value = serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();

        assert_eq!(json["version"], 0);
        assert_eq!(json["packageId"], "0x2");
        assert_eq!(json["services"][1][0], "0xb");
        assert_eq!(json["services"][1][1], 2);
        assert_eq!(json["threshold"], 1);

        let shares = &json["encryptedShares"]["BonehFranklinBLS12381"];
        assert_eq!(shares["encryptedShares"][0], "AQI=");
        assert!(shares["encryptedRandomness"].is_string());

        let ct = &json["ciphertext"]["Hmac256Ctr"];
        assert_eq!(ct["ciphertext"], "CQk=");
        assert!(ct.get("aad").is_none());
    }

    #[test]
    fn test_parse_round_trip() {
        let object = sample();
        let parsed = EncryptedObject::from_bytes(&object.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, object);
        assert_eq!(parsed.full_id(), "2:obj-1");
    }

    #[test]
    fn test_unknown_ibe_variant_is_unsupported() {
        let mut json: serde_json::Value =
            serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        let inner = json["encryptedShares"]["BonehFranklinBLS12381"].take();
        json["encryptedShares"] = serde_json::json!({ "SomeOtherScheme": inner });

        let err = EncryptedObject::from_bytes(json.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature(_)), "{:?}", err);
    }

    #[test]
    fn test_unknown_ciphertext_variant_is_invalid() {
        let mut json: serde_json::Value =
            serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        let inner = json["ciphertext"]["Hmac256Ctr"].take();
        json["ciphertext"] = serde_json::json!({ "Plain": inner });

        let err = EncryptedObject::from_bytes(json.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidCiphertext(_)), "{:?}", err);
    }

    #[test]
    fn test_share_count_mismatch_rejected() {
        let mut object = sample();
        object.services.push(("0xc".into(), 3));
        let err = EncryptedObject::from_bytes(&object.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidCiphertext(_)));
    }

    #[test]
    fn test_garbage_is_invalid_ciphertext() {
        assert!(matches!(
            EncryptedObject::from_bytes(b"not json"),
            Err(Error::InvalidCiphertext(_))
        ));
    }
}
