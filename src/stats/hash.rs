//! Content hashing for change detection
//!
//! The store never compares stats field by field. It hashes the canonical
//! JSON serialization of a record instead: struct fields serialize in
//! declaration order and open fields live in a sorted map, so equal records
//! always produce equal digests.

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::error::Result;

/// SHA-1 digest of a stats record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 20]);

impl ContentHash {
    /// Hash the canonical serialization of `value`
    pub fn of<T: Serialize>(value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)?;
        let mut hasher = Sha1::new();
        hasher.update(&encoded);
        let mut digest = [0u8; 20];
        digest.copy_from_slice(&hasher.finalize());
        Ok(Self(digest))
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{InboundPadStats, TransportStats};
    use serde_json::json;

    #[test]
    fn test_equal_records_hash_equal() {
        let a = TransportStats::new("t1");
        let b = TransportStats::new("t1");
        assert_eq!(ContentHash::of(&a).unwrap(), ContentHash::of(&b).unwrap());
    }

    #[test]
    fn test_changed_field_changes_hash() {
        let a = InboundPadStats::new("t1", "p1");
        let mut b = a.clone();
        b.packets_received = Some(10);
        assert_ne!(ContentHash::of(&a).unwrap(), ContentHash::of(&b).unwrap());
    }

    #[test]
    fn test_extra_field_order_does_not_matter() {
        let a: TransportStats =
            serde_json::from_value(json!({"transportId": "t1", "a": 1, "b": 2})).unwrap();
        let b: TransportStats =
            serde_json::from_value(json!({"b": 2, "transportId": "t1", "a": 1})).unwrap();
        assert_eq!(ContentHash::of(&a).unwrap(), ContentHash::of(&b).unwrap());
    }

    #[test]
    fn test_hex_display() {
        let hash = ContentHash::of(&json!({})).unwrap();
        let hex = hash.to_string();
        assert_eq!(hex.len(), 40);
        // sha1("{}")
        assert_eq!(hex, "bf21a9e8fbc5a3846fb05b4fa0859e0917b2202f");
    }
}
