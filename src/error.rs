//! # Error Handling
//!
//! Error types for the threshold encryption client.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Configuration Errors                                              │
//! │  │   └── InvalidClientOptions   - Duplicate ids, API key pairing       │
//! │  │                                                                      │
//! │  ├── Validation Errors                                                 │
//! │  │   ├── InvalidThreshold       - Threshold out of range               │
//! │  │   └── InvalidShares          - Empty / mismatched share sets        │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed / DecryptionFailed                           │
//! │  │   ├── InvalidMac             - HMAC-CTR tag mismatch                │
//! │  │   ├── InvalidKey             - Bad key length / encoding            │
//! │  │   └── SigningFailed / VerificationFailed                            │
//! │  │                                                                      │
//! │  ├── Ciphertext Errors                                                 │
//! │  │   ├── InvalidCiphertext      - Malformed envelope / share count     │
//! │  │   ├── UnsupportedFeature     - Unknown IBE variant                  │
//! │  │   ├── NotEnoughShares        - Fetch more keys                      │
//! │  │   └── InconsistentKeyServers - Recovered shares disagree            │
//! │  │                                                                      │
//! │  ├── Key Server Errors                                                 │
//! │  │   ├── InvalidKeyServer       - Not found / failed liveness          │
//! │  │   ├── KeyServerApi           - Non-2xx response                     │
//! │  │   ├── Transport              - Connection level failure             │
//! │  │   └── Timeout                                                       │
//! │  │                                                                      │
//! │  └── Threshold / Authorization Errors                                  │
//! │      ├── TooManyFailedFetchKeyRequests - Quorum exhausted              │
//! │      └── ExpiredSessionKey                                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-server failures inside a quorum fetch never surface individually.
//! They are collected and, if the quorum cannot be reached, collapsed into a
//! single error with [`majority_error`].

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Configuration Errors (100-199)
    // ========================================================================
    /// Client options were rejected
    #[error("Invalid client options: {0}")]
    InvalidClientOptions(String),

    // ========================================================================
    // Validation Errors (200-299)
    // ========================================================================
    /// Threshold outside the permitted range
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Share set cannot be split or combined
    #[error("Invalid shares: {0}")]
    InvalidShares(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Authentication tag did not match
    #[error("Invalid MAC")]
    InvalidMac,

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Signature verification failed
    #[error("Signature verification failed")]
    VerificationFailed,

    // ========================================================================
    // Ciphertext Errors (400-499)
    // ========================================================================
    /// Malformed encrypted object
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Encryption mode not supported by this client
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Fewer keys available than the object threshold
    #[error("not enough shares, please fetch more keys")]
    NotEnoughShares,

    /// Recovered shares do not describe the same secret
    #[error("Inconsistent key servers: {0}")]
    InconsistentKeyServers(String),

    // ========================================================================
    // Key Server Errors (500-599)
    // ========================================================================
    /// Key server could not be resolved or failed verification
    #[error("Invalid key server: {0}")]
    InvalidKeyServer(String),

    /// Key server answered with a non-success status
    #[error("Key server error {status}: {message}")]
    KeyServerApi {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ========================================================================
    // Threshold / Authorization Errors (600-699)
    // ========================================================================
    /// Every key server was tried and the threshold was not reached
    #[error("{0}")]
    TooManyFailedFetchKeyRequests(String),

    /// Session key certificate is past its expiry
    #[error("Session key expired")]
    ExpiredSessionKey,

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl Error {
    /// Numeric error code
    ///
    /// - 100-199: Configuration
    /// - 200-299: Validation
    /// - 300-399: Crypto
    /// - 400-499: Ciphertext
    /// - 500-599: Key server
    /// - 600-699: Threshold / authorization
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidClientOptions(_) => 100,

            Error::InvalidThreshold(_) => 200,
            Error::InvalidShares(_) => 201,

            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed(_) => 301,
            Error::InvalidMac => 302,
            Error::InvalidKey(_) => 303,
            Error::SigningFailed(_) => 304,
            Error::VerificationFailed => 305,

            Error::InvalidCiphertext(_) => 400,
            Error::UnsupportedFeature(_) => 401,
            Error::NotEnoughShares => 402,
            Error::InconsistentKeyServers(_) => 403,

            Error::InvalidKeyServer(_) => 500,
            Error::KeyServerApi { .. } => 501,
            Error::Transport(_) => 502,
            Error::Timeout(_) => 503,

            Error::TooManyFailedFetchKeyRequests(_) => 600,
            Error::ExpiredSessionKey => 601,

            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
            Error::DeserializationError(_) => 902,
        }
    }

    /// Check if retrying the same call could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Timeout(_) | Error::NotEnoughShares => true,
            Error::KeyServerApi { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Collapse a list of per-server failures into the most frequent one.
///
/// Errors are compared by their rendered message. Ties go to the message
/// that was seen first. Returns `None` for an empty list.
pub fn majority_error(errors: &[Error]) -> Option<Error> {
    let mut counts: Vec<(String, usize, &Error)> = Vec::new();
    for err in errors {
        let msg = err.to_string();
        match counts.iter_mut().find(|(m, _, _)| *m == msg) {
            Some(entry) => entry.1 += 1,
            None => counts.push((msg, 1, err)),
        }
    }

    let mut best: Option<&(String, usize, &Error)> = None;
    for entry in &counts {
        if best.map_or(true, |b| entry.1 > b.1) {
            best = Some(entry);
        }
    }
    best.map(|(_, _, err)| (*err).clone())
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::DeserializationError(err.to_string())
        } else {
            Error::SerializationError(err.to_string())
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::InvalidKey(format!("Invalid hex: {}", err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::DeserializationError(format!("Invalid base64: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Error::KeyServerApi {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Error::DeserializationError(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
