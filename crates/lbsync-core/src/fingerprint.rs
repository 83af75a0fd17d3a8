//! Content fingerprints
//!
//! A fingerprint is the hex encoded SHA-256 digest of a value's JSON serialization. Struct
//! fields serialize in declaration order and `serde_json` objects keep their keys sorted, so
//! equal values always produce the same bytes and therefore the same fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::LbsyncResult;

/// Deterministic content hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw bytes
    pub fn digest(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Fingerprint the canonical JSON serialization of a value
    pub fn of<T: Serialize + ?Sized>(value: &T) -> LbsyncResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::digest(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_hex_sha256() {
        let fp = Fingerprint::digest(b"abc");
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_object_key_order_does_not_matter() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b = json!({"a": 2, "b": 1});

        assert_eq!(Fingerprint::of(&a).unwrap(), Fingerprint::of(&b).unwrap());
    }

    #[test]
    fn test_different_content_differs() {
        let a = Fingerprint::of(&json!({"domain": "a.com"})).unwrap();
        let b = Fingerprint::of(&json!({"domain": "b.com"})).unwrap();
        assert_ne!(a, b);
    }
}
