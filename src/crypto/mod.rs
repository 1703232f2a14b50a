//! # Cryptography Module
//!
//! Primitives behind threshold encryption.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  base key (32 random bytes)                                            │
//! │      │                                                                  │
//! │      ├──► shamir::split ──► share_i ⊕ kdf::share_mask(pk_i, full_id, i)│
//! │      │                                                                  │
//! │      └──► kdf::derive_key(Dem, ...) ──► dem key                        │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                          dem: AES-256-GCM | HMAC-SHA256 + AES-256-CTR  │
//! │                                                                         │
//! │  signing: Ed25519 session certificates and request signatures          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | Shamir over GF(2⁸) | Splitting the base key across key servers |
//! | HMAC-SHA256 | Purpose-bound key derivation |
//! | SHA-256 | Share masks, randomness digest |
//! | AES-256-GCM | Default payload encryption |
//! | AES-256-CTR + HMAC-SHA256 | Alternative payload encryption |
//! | Ed25519 | Session keys |
//!
//! Randomness always comes from `rand::rngs::OsRng`.

pub mod dem;
pub mod kdf;
pub mod shamir;
pub mod signing;

pub use dem::{DemStrategy, DemType};
pub use kdf::{derive_key, digest, share_mask, KeyPurpose};
pub use shamir::{combine, interpolate_at, split, Share};
pub use signing::{sign, verify, Signature, SigningKeyPair, SIGNATURE_SIZE};
