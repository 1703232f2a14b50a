//! Identifier, byte and encoding helpers shared across modules.

use crate::error::{Error, Result};

/// Exclusive upper bound on share counts and thresholds
pub const MAX_U8: usize = 255;

/// Build the `{package}:{id}` identity that masks and keys are bound to.
///
/// A leading `0x` on the package id is dropped.
pub fn create_full_id(package_id: &str, inner_id: &str) -> String {
    let package = package_id.strip_prefix("0x").unwrap_or(package_id);
    format!("{}:{}", package, inner_id)
}

/// XOR two equal-length byte strings
pub fn xor(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.len() != b.len() {
        return Err(Error::Internal(format!(
            "xor length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(xor_unchecked(a, b))
}

/// XOR `a` with the first `a.len()` bytes of `b`.
///
/// `b` must be at least as long as `a`.
pub(crate) fn xor_unchecked(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// Lowercase, trim and drop a `0x` prefix
pub fn normalize_hex(s: &str) -> String {
    let s = s.trim().to_lowercase();
    match s.strip_prefix("0x") {
        Some(rest) => rest.to_string(),
        None => s,
    }
}

/// Decode a hex string, tolerating case and a `0x` prefix
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(normalize_hex(s))?)
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// Byte fields travel as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Optional base64 byte field; pair with `skip_serializing_if = "Option::is_none"`.
pub(crate) mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// List of base64 byte strings
pub(crate) mod base64_list {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(items: &[Vec<u8>], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&STANDARD.encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
