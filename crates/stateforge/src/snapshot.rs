//! # Snapshots and the Structural Checksum
//!
//! Every backend writes the same unit:
//!
//! ```json
//! { "state": { ... }, "updated_at": "2024-05-01T12:00:00Z", "checksum": "ab12…" }
//! ```
//!
//! The checksum is SHA-256 over the sorted key names of `state`, hex encoded.
//! Values do not participate. It answers one question: does this payload still
//! agree with its own shape? A snapshot whose recomputed checksum differs from
//! the stored one is discarded on load, never merged. It is not a tamper check.

use crate::error::Result;
use crate::model::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
    pub checksum: String,
}

impl Snapshot {
    /// Captures the persistable part of `state`, stamped now.
    pub fn capture(state: &State) -> Self {
        let data = state.data();
        let checksum = structural_checksum(data.keys().map(String::as_str));
        Self {
            state: data,
            updated_at: Utc::now(),
            checksum,
        }
    }

    /// Recomputes the checksum from this snapshot's own key set.
    pub fn is_consistent(&self) -> bool {
        structural_checksum(self.state.keys().map(String::as_str)) == self.checksum
    }

    /// Parses a raw payload. Anything that is not a well-formed snapshot is
    /// `None`; consistency is checked separately.
    pub fn from_value(raw: Value) -> Option<Self> {
        serde_json::from_value(raw).ok()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Hash over a set of key names. Order-insensitive.
pub fn structural_checksum<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
    let mut keys: Vec<&str> = keys.into_iter().collect();
    keys.sort_unstable();
    keys.dedup();

    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;
    use serde_json::json;

    #[test]
    fn checksum_ignores_key_order() {
        assert_eq!(
            structural_checksum(["a", "b", "c"]),
            structural_checksum(["c", "a", "b"])
        );
    }

    #[test]
    fn checksum_depends_on_key_set() {
        assert_ne!(
            structural_checksum(["count"]),
            structural_checksum(["count", "step"])
        );
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(structural_checksum(["ab", "c"]), structural_checksum(["a", "bc"]));
    }

    #[test]
    fn capture_is_consistent_and_skips_behavior() {
        let state = State::new()
            .with("count", 2)
            .with("inc", Field::callable(|_| Value::Null));
        let snap = Snapshot::capture(&state);

        assert!(snap.is_consistent());
        assert_eq!(snap.state.len(), 1);
        assert_eq!(snap.checksum, structural_checksum(["count"]));
    }

    #[test]
    fn values_do_not_affect_consistency() {
        let mut snap = Snapshot::capture(&State::new().with("count", 1));
        snap.state.insert("count".into(), json!("garbage"));
        assert!(snap.is_consistent());
    }

    #[test]
    fn added_key_breaks_consistency() {
        let mut snap = Snapshot::capture(&State::new().with("count", 1));
        snap.state.insert("extra".into(), json!(0));
        assert!(!snap.is_consistent());
    }

    #[test]
    fn from_value_rejects_partial_payloads() {
        assert!(Snapshot::from_value(json!({"state": {}})).is_none());
        assert!(Snapshot::from_value(json!("nope")).is_none());

        let snap = Snapshot::capture(&State::new().with("a", true));
        let parsed = Snapshot::from_value(snap.to_value().unwrap()).unwrap();
        assert_eq!(parsed, snap);
    }
}
