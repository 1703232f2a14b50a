//! # Seal Core
//!
//! A threshold identity-based encryption client. Data is encrypted so that
//! it can only be decrypted once a quorum of independent key servers have
//! released their keys for the data's identity.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SEAL CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                         SealClient                              │   │
//! │  │   encrypt · fetch_keys · decrypt · get_derived_keys             │   │
//! │  └──────┬──────────────────┬──────────────────┬────────────────────┘   │
//! │         │                  │                  │                        │
//! │  ┌──────▼──────┐   ┌───────▼───────┐   ┌──────▼──────┐                 │
//! │  │   Engine    │   │  Key Servers  │   │  Key Cache  │                 │
//! │  │             │   │               │   │             │                 │
//! │  │ - Encrypt   │   │ - Resolve     │   │ - (id, srv) │                 │
//! │  │ - Decrypt   │   │ - Verify      │   │   → key     │                 │
//! │  │             │   │ - Fetch keys  │   │             │                 │
//! │  └──────┬──────┘   └───────┬───────┘   └─────────────┘                 │
//! │         │                  │                                            │
//! │  ┌──────▼──────┐   ┌───────▼───────┐   ┌─────────────┐                 │
//! │  │   Crypto    │   │  Session Key  │   │   Object    │                 │
//! │  │             │   │               │   │             │                 │
//! │  │ - Shamir    │   │ - Ed25519     │   │ - Wire JSON │                 │
//! │  │ - KDF       │   │ - Certificate │   │             │                 │
//! │  │ - DEM       │   │               │   │             │                 │
//! │  └─────────────┘   └───────────────┘   └─────────────┘                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Secret sharing, key derivation, DEMs, signing
//! - [`object`] - The encrypted object wire format
//! - [`engine`] - Threshold encrypt / decrypt
//! - [`key_server`] - Key server registry and HTTP transport
//! - [`session_key`] - Ephemeral request-signing identities
//! - [`cache`] - Recovered key store
//! - [`client`] - Quorum orchestration
//! - [`config`] - Client configuration
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use seal_core::{ClientOptions, DecryptOptions, DemType, EncryptOptions, SealClient, SessionKey};
//!
//! let configs = seal_core::config::key_server_configs_from_json(&std::fs::read_to_string("servers.json")?)?;
//! let client = SealClient::new(ClientOptions::new(configs))?;
//!
//! let (object, _) = client
//!     .encrypt(EncryptOptions {
//!         dem_type: DemType::Aes256Gcm,
//!         threshold: 2,
//!         package_id: "0x2",
//!         id: "obj-1",
//!         data: b"hello seal",
//!         aad: b"",
//!     })
//!     .await?;
//!
//! let session = SessionKey::new("0x2", "0xabc", Duration::from_secs(600))?;
//! let plaintext = client
//!     .decrypt(DecryptOptions {
//!         data: &object,
//!         session_key: &session,
//!         tx_bytes: &tx_bytes,
//!         check_share_consistency: false,
//!         check_le_encoding: false,
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cache;
pub mod client;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod key_server;
pub mod object;
pub mod session_key;
pub mod time;
pub mod utils;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use cache::{KeyCache, KeyCacheKey, KeySource};
pub use client::{
    DecryptOptions, EncryptOptions, FetchKeysOptions, GetDerivedKeysOptions, SealClient,
};
pub use config::{ClientConfig, ClientOptions};
pub use crypto::{DemStrategy, DemType};
pub use engine::DecryptChecks;
pub use error::{Error, Result};
pub use key_server::{
    DerivedKey, HttpTransport, KeyServer, KeyServerConfig, KeyServerTransport, ServerType,
};
pub use object::EncryptedObject;
pub use session_key::{Certificate, ExportedSessionKey, RequestParams, SessionKey};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Seal Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
