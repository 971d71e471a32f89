// Unit tests for canonicalization and content digests

use crate::config_sync::canonical::{MAX_CANONICAL_DEPTH, canonicalize, content_digest};
use crate::error::SyncError;

use serde_json::{Value, json};

fn nested_arrays(levels: usize) -> Value {
    let mut value = json!(1);
    for _ in 0..levels {
        value = json!([value]);
    }
    value
}

/// **VALUE**: Verifies that key order does not affect the digest at any depth.
///
/// **WHY THIS MATTERS**: The endpoint and the local file may serialize objects in
/// different orders; a false mismatch rewrites the file and restarts for nothing.
///
/// **BUG THIS CATCHES**: Would catch nested objects (inside arrays) being left unsorted.
#[test]
fn given_permuted_keys_when_digested_then_digests_match() {
    // GIVEN: The same document with keys permuted at every level
    let left = json!({"b": 1, "a": {"y": [1, {"d": 2, "c": 3}], "x": null}});
    let right = json!({"a": {"x": null, "y": [1, {"c": 3, "d": 2}]}, "b": 1});

    // WHEN: Digesting both
    let left_hash = content_digest(&left).expect("digest");
    let right_hash = content_digest(&right).expect("digest");

    // THEN: Same digest
    assert_eq!(left_hash, right_hash);
}

/// **VALUE**: Verifies that array order is significant.
///
/// **WHY THIS MATTERS**: Arrays are ordered data; reordering them is a real change.
///
/// **BUG THIS CATCHES**: Would catch arrays being sorted along with object keys.
#[test]
fn given_reordered_array_when_digested_then_digests_differ() {
    let left = content_digest(&json!({"list": [1, 2]})).expect("digest");
    let right = content_digest(&json!({"list": [2, 1]})).expect("digest");

    assert_ne!(left, right);
}

/// **VALUE**: Verifies the digest is a SHA-256 hex string.
///
/// **BUG THIS CATCHES**: Would catch a different hash or raw-byte encoding sneaking in.
#[test]
fn given_document_when_digested_then_returns_64_lowercase_hex_chars() {
    let hash = content_digest(&json!({"a": 1})).expect("digest");

    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

/// **VALUE**: Verifies that the canonical form serializes with sorted keys.
///
/// **WHY THIS MATTERS**: The digest is taken over this serialization.
///
/// **BUG THIS CATCHES**: Would catch the rebuild step emitting keys in visit order.
#[test]
fn given_unsorted_object_when_canonicalized_then_serializes_sorted() {
    // GIVEN: Keys out of order, with a nested object
    let value = json!({"z": {"b": true, "a": false}, "m": [3, 2], "a": "x"});

    // WHEN: Canonicalizing
    let canonical = canonicalize(&value).expect("canonicalize");

    // THEN: Sorted keys, arrays untouched
    let serialized = serde_json::to_string(&canonical).expect("serialize");
    assert_eq!(serialized, r#"{"a":"x","m":[3,2],"z":{"a":false,"b":true}}"#);
}

/// **VALUE**: Verifies canonicalization is idempotent and value-preserving.
///
/// **BUG THIS CATCHES**: Would catch the explicit stack dropping or duplicating children.
#[test]
fn given_canonical_value_when_canonicalized_again_then_unchanged() {
    let value = json!({
        "accounts": {"two": {"enabled": false}, "one": {"enabled": true, "tags": ["a", "b"]}},
        "empty_object": {},
        "empty_array": [],
        "numbers": [1, 2.5, -3]
    });

    let once = canonicalize(&value).expect("first pass");
    let twice = canonicalize(&once).expect("second pass");

    assert_eq!(once, twice);
    assert_eq!(once, value);
}

/// **VALUE**: Verifies scalars canonicalize to themselves.
#[test]
fn given_scalar_when_canonicalized_then_returns_same_scalar() {
    for value in [json!(null), json!(true), json!(42), json!("text")] {
        assert_eq!(canonicalize(&value).expect("scalar"), value);
    }
}

/// **VALUE**: Verifies that documents at the nesting limit are accepted.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one rejecting legitimate deep configs.
#[test]
fn given_document_at_depth_limit_when_canonicalized_then_succeeds() {
    let value = nested_arrays(MAX_CANONICAL_DEPTH);

    let canonical = canonicalize(&value).expect("at the limit");

    assert_eq!(canonical, value);
}

/// **VALUE**: Verifies that nesting beyond the limit is rejected instead of recursing.
///
/// **WHY THIS MATTERS**: A hostile endpoint must not be able to exhaust the stack.
///
/// **BUG THIS CATCHES**: Would catch the depth bound being removed or not enforced.
#[test]
fn given_document_beyond_depth_limit_when_canonicalized_then_returns_protocol_error() {
    let value = nested_arrays(MAX_CANONICAL_DEPTH + 1);

    let result = canonicalize(&value);

    assert!(matches!(result, Err(SyncError::Protocol { .. })));
}
