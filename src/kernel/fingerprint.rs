//! Snapshot Hasher.
//!
//! A fingerprint is the canonical JSON encoding of an input snapshot: object
//! keys sorted at every depth, array order kept, no whitespace. Two snapshots
//! with the same content always produce the same string regardless of the
//! order their keys were inserted in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Everything the user has entered so far. Owned by the caller, only read here.
pub type InputSnapshot = Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a snapshot. `null` and `{}` both map to the empty
    /// fingerprint, which means "nothing to generate yet".
    pub fn of(snapshot: &InputSnapshot) -> Self {
        match snapshot {
            Value::Null => Self::empty(),
            Value::Object(map) if map.is_empty() => Self::empty(),
            other => Self(to_canonical_json(other)),
        }
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 16 hex chars for log lines. Fingerprints carry user content and never
    /// go to logs or telemetry verbatim.
    pub fn short(&self) -> String {
        let mut s = DefaultHasher::new();
        self.0.hash(&mut s);
        format!("{:016x}", s.finish())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("<empty>")
        } else {
            f.write_str(&self.short())
        }
    }
}

/// Canonical JSON: sorted object keys, preserved array order, compact.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map
                .iter()
                .map(|(k, v)| (k, to_canonical_json(v)))
                .collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", quote(k), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

fn quote(s: &str) -> String {
    // Serializing a str into a String cannot fail.
    serde_json::to_string(s).unwrap_or_default()
}
