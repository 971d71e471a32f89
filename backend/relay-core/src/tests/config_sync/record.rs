use crate::config_sync::ReconciliationRecord;
use crate::config_sync::canonical::MAX_CANONICAL_DEPTH;
use crate::error::SyncError;

use serde_json::{Value, json};

fn too_deep() -> Value {
    let mut value = json!(0);
    for _ in 0..=MAX_CANONICAL_DEPTH {
        value = json!({ "next": value });
    }
    value
}

/// **VALUE**: Verifies that no local configuration never counts as current.
///
/// **BUG THIS CATCHES**: Would catch two empty hashes comparing equal.
#[test]
fn given_no_local_config_when_record_built_then_not_current() {
    let record = ReconciliationRecord::new(None, json!({"a": 1})).expect("record");

    assert!(record.local_hash.is_empty());
    assert!(!record.remote_hash.is_empty());
    assert!(!record.is_current());
}

/// **VALUE**: Verifies that permuted but equal documents count as current.
///
/// **WHY THIS MATTERS**: Equal content must never trigger a write and restart.
#[test]
fn given_permuted_local_config_when_record_built_then_current() {
    let local = json!({"b": [1, 2], "a": {"y": 2, "x": 1}});
    let remote = json!({"a": {"x": 1, "y": 2}, "b": [1, 2]});

    let record = ReconciliationRecord::new(Some(local), remote).expect("record");

    assert!(record.is_current());
}

/// **VALUE**: Verifies a changed value is detected.
#[test]
fn given_changed_value_when_record_built_then_not_current() {
    let record =
        ReconciliationRecord::new(Some(json!({"a": 1})), json!({"a": 2})).expect("record");

    assert!(!record.is_current());
}

/// **VALUE**: Verifies that an unhashable local document forces an update.
///
/// **WHY THIS MATTERS**: A broken local file should be overwritten, not block the sync.
///
/// **BUG THIS CATCHES**: Would catch local hash failures aborting the attempt.
#[test]
fn given_too_deep_local_config_when_record_built_then_hashes_as_absent() {
    let record = ReconciliationRecord::new(Some(too_deep()), json!({"a": 1})).expect("record");

    assert!(record.local_hash.is_empty());
    assert!(!record.is_current());
}

/// **VALUE**: Verifies that an unhashable remote document is a protocol error.
///
/// **BUG THIS CATCHES**: Would catch a hostile payload being written to disk.
#[test]
fn given_too_deep_remote_config_when_record_built_then_returns_protocol_error() {
    let result = ReconciliationRecord::new(None, too_deep());

    assert!(matches!(result, Err(SyncError::Protocol { .. })));
}
