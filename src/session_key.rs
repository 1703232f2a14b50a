//! # Session Key
//!
//! A short-lived, self-certified identity that authorizes key-fetch requests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SESSION KEY                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ephemeral Ed25519 keypair                                             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Certificate { address, packageId, expiresAt, pubKey, signature }      │
//! │        signature = Sign(sk, json{address, packageId, expiresAt, pubKey})│
//! │                                                                         │
//! │  create_request_params(tx_bytes)                                       │
//! │        → { txBytes, signature = Sign(sk, tx_bytes), certificate }      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The authorization bytes are opaque here: they are signed and forwarded,
//! never interpreted.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::signing::{self, Signature, SigningKeyPair};
use crate::error::{Error, Result};
use crate::time;
use crate::utils::base64_bytes;

/// Self-signed statement binding an ephemeral key to an address and package
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Account the session acts for
    pub address: String,
    /// Package whose identities the session may request
    pub package_id: String,
    /// Unix timestamp (seconds) after which the session is invalid
    pub expires_at: i64,
    /// Ed25519 public key of the session
    #[serde(with = "base64_bytes")]
    pub pub_key: Vec<u8>,
    /// Signature over the other fields
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

/// The bytes covered by a certificate signature
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificatePayload<'a> {
    address: &'a str,
    package_id: &'a str,
    expires_at: i64,
    pub_key: String,
}

impl Certificate {
    fn signing_payload(&self) -> Result<Vec<u8>> {
        let payload = CertificatePayload {
            address: &self.address,
            package_id: &self.package_id,
            expires_at: self.expires_at,
            pub_key: STANDARD.encode(&self.pub_key),
        };
        serde_json::to_vec(&payload).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Check the self-signature
    pub fn verify(&self) -> Result<()> {
        let signature = Signature::from_slice(&self.signature)?;
        signing::verify(&self.pub_key, &self.signing_payload()?, &signature)
    }

    /// Whether `expires_at` has passed
    pub fn is_expired(&self) -> bool {
        time::now_timestamp() >= self.expires_at
    }
}

/// Authorization attached to a key-fetch request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    /// Opaque authorization bytes
    #[serde(with = "base64_bytes")]
    pub tx_bytes: Vec<u8>,
    /// Session signature over `tx_bytes`
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Certificate of the signing session
    pub certificate: Certificate,
}

/// Raw export of a session key
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSessionKey {
    /// 32-byte Ed25519 secret
    #[serde(with = "base64_bytes")]
    pub secret_key: Vec<u8>,
    /// Certificate issued for the key
    #[zeroize(skip)]
    pub certificate: Certificate,
}

impl ExportedSessionKey {
    /// Encode as JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Decode from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Debug for ExportedSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedSessionKey")
            .field("secret_key", &"<redacted>")
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// Ephemeral signing identity for key-fetch requests
pub struct SessionKey {
    keypair: SigningKeyPair,
    certificate: Certificate,
}

impl SessionKey {
    /// Create a fresh session valid for `ttl`
    pub fn new(package_id: &str, address: &str, ttl: Duration) -> Result<Self> {
        let keypair = SigningKeyPair::generate();
        let mut certificate = Certificate {
            address: address.to_string(),
            package_id: package_id.to_string(),
            expires_at: time::expires_after(ttl),
            pub_key: keypair.public_bytes().to_vec(),
            signature: Vec::new(),
        };
        let payload = certificate.signing_payload()?;
        certificate.signature = signing::sign(&keypair, &payload).as_bytes().to_vec();

        tracing::debug!(
            "Created session key for {} on package {}, expires at {}",
            address,
            package_id,
            certificate.expires_at
        );
        Ok(Self {
            keypair,
            certificate,
        })
    }

    /// Package this session is scoped to
    pub fn package_id(&self) -> &str {
        &self.certificate.package_id
    }

    /// Address this session acts for
    pub fn address(&self) -> &str {
        &self.certificate.address
    }

    /// The session certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Whether the certificate has expired
    pub fn is_expired(&self) -> bool {
        self.certificate.is_expired()
    }

    /// Sign `tx_bytes` and bundle them with the certificate
    pub fn create_request_params(&self, tx_bytes: &[u8]) -> Result<RequestParams> {
        let signature = signing::sign(&self.keypair, tx_bytes);
        Ok(RequestParams {
            tx_bytes: tx_bytes.to_vec(),
            signature: signature.as_bytes().to_vec(),
            certificate: self.certificate.clone(),
        })
    }

    /// Export the raw secret and certificate
    pub fn export(&self) -> ExportedSessionKey {
        ExportedSessionKey {
            secret_key: self.keypair.secret_bytes().to_vec(),
            certificate: self.certificate.clone(),
        }
    }

    /// Rebuild a session from an export.
    ///
    /// The secret must match the certificate's public key. Expiry is not
    /// re-checked here; key servers reject expired certificates.
    pub fn import(exported: &ExportedSessionKey) -> Result<Self> {
        let keypair = SigningKeyPair::from_slice(&exported.secret_key)?;
        if keypair.public_bytes().as_slice() != exported.certificate.pub_key.as_slice() {
            return Err(Error::InvalidKey(
                "secret key does not match certificate public key".into(),
            ));
        }
        Ok(Self {
            keypair,
            certificate: exported.certificate.clone(),
        })
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
