//! Order-independent canonical form and content digest for JSON configuration.
//!
//! Two documents that differ only in object key order canonicalize to the same value
//! and therefore hash to the same digest. The traversal uses an explicit work stack so
//! nesting depth is bounded by [`MAX_CANONICAL_DEPTH`] rather than by the thread stack.

use crate::error::SyncError;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Deepest nesting accepted before a document is rejected as hostile.
pub const MAX_CANONICAL_DEPTH: usize = 128;

enum Work<'a> {
    Visit(&'a Value, usize),
    CollectArray(usize),
    CollectObject(Vec<&'a str>),
}

/// Rebuild `value` with every object's keys in sorted order.
///
/// # Errors
///
/// Returns [`SyncError::Protocol`] if nesting exceeds [`MAX_CANONICAL_DEPTH`].
pub fn canonicalize(value: &Value) -> Result<Value, SyncError> {
    let mut work = vec![Work::Visit(value, 0)];
    let mut built: Vec<Value> = Vec::new();

    while let Some(item) = work.pop() {
        match item {
            Work::Visit(node, depth) => {
                if depth > MAX_CANONICAL_DEPTH {
                    return Err(SyncError::protocol(format!(
                        "Configuration nesting exceeds {MAX_CANONICAL_DEPTH} levels"
                    )));
                }

                match node {
                    Value::Array(items) => {
                        work.push(Work::CollectArray(items.len()));
                        // Reversed so the first element is finished first.
                        for child in items.iter().rev() {
                            work.push(Work::Visit(child, depth + 1));
                        }
                    }
                    Value::Object(map) => {
                        let mut entries: Vec<(&str, &Value)> =
                            map.iter().map(|(key, child)| (key.as_str(), child)).collect();
                        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

                        work.push(Work::CollectObject(
                            entries.iter().map(|(key, _)| *key).collect(),
                        ));
                        for &(_, child) in entries.iter().rev() {
                            work.push(Work::Visit(child, depth + 1));
                        }
                    }
                    scalar => built.push(scalar.clone()),
                }
            }
            Work::CollectArray(len) => {
                let items = built.split_off(built.len() - len);
                built.push(Value::Array(items));
            }
            Work::CollectObject(keys) => {
                let values = built.split_off(built.len() - keys.len());
                let mut map = Map::with_capacity(keys.len());
                for (key, value) in keys.into_iter().zip(values) {
                    map.insert(key.to_string(), value);
                }
                built.push(Value::Object(map));
            }
        }
    }

    built
        .pop()
        .ok_or_else(|| SyncError::protocol("Canonicalization produced no value"))
}

/// SHA-256 hex digest of the canonical serialization of `value`.
pub fn content_digest(value: &Value) -> Result<String, SyncError> {
    let canonical = canonicalize(value)?;
    let bytes = serde_json::to_vec(&canonical)
        .map_err(|e| SyncError::protocol(format!("Failed to serialize configuration: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
