//! Snapshot digest canonicalization
//!
//! Computes stable SHA256 digests of repository data so a snapshot can be
//! checked before it is trusted.

use kestrel_core::{RepositoryData, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a stable digest for repository data
///
/// Returns a SHA256 hex digest of the canonical JSON representation: kinds,
/// ids and object keys in ascending order, no whitespace.
///
/// # Errors
///
/// Serialization failures.
pub fn compute_data_digest(data: &RepositoryData) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(data)?);
    let json = serde_json::to_vec(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
