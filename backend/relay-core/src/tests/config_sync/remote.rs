// Unit tests for response envelope resolution

use crate::config_sync::remote::ConfigEnvelope;
use crate::error::SyncError;

use serde_json::{Value, json};

fn resolve(body: Value) -> Result<Value, SyncError> {
    let envelope: ConfigEnvelope = serde_json::from_value(body).expect("envelope shape");
    envelope.into_configuration()
}

fn protocol_message(result: Result<Value, SyncError>) -> String {
    match result {
        Err(SyncError::Protocol { message, .. }) => message,
        other => panic!("expected protocol error, got {other:?}"),
    }
}

/// **VALUE**: Verifies `worker.configs` is preferred as the configuration.
///
/// **BUG THIS CATCHES**: Would catch the envelope itself being written to disk.
#[test]
fn given_worker_configs_when_resolved_then_returns_configs() {
    let body = json!({
        "success": true,
        "worker": {"configs": {"accounts": {"a": {"enabled": true}}}},
        "ignored": 1
    });

    let config = resolve(body).expect("configuration");

    assert_eq!(config, json!({"accounts": {"a": {"enabled": true}}}));
}

/// **VALUE**: Verifies the root-shaped response is accepted.
///
/// **WHY THIS MATTERS**: Some endpoints put the configuration next to `success`.
///
/// **BUG THIS CATCHES**: Would catch `success`/`error` leaking into the written document.
#[test]
fn given_root_fields_when_resolved_then_returns_them_without_envelope_fields() {
    let body = json!({"success": true, "error": null, "accounts": {}, "version": 2});

    let config = resolve(body).expect("configuration");

    assert_eq!(config, json!({"accounts": {}, "version": 2}));
}

/// **VALUE**: Verifies an endpoint-reported failure is a protocol error with its reason.
#[test]
fn given_success_false_when_resolved_then_returns_protocol_error_with_reason() {
    let message = protocol_message(resolve(json!({"success": false, "error": "unknown host"})));

    assert!(message.contains("unknown host"), "message was: {message}");
}

/// **VALUE**: Verifies a response without `success` counts as failure.
///
/// **BUG THIS CATCHES**: Would catch arbitrary JSON (e.g. an error page body) being applied.
#[test]
fn given_missing_success_flag_when_resolved_then_returns_protocol_error() {
    protocol_message(resolve(json!({"accounts": {}})));
}

/// **VALUE**: Verifies that an empty configuration is rejected in both shapes.
///
/// **WHY THIS MATTERS**: Writing `{}` would wipe every account from the relay.
#[test]
fn given_empty_configuration_when_resolved_then_returns_protocol_error() {
    protocol_message(resolve(json!({"success": true})));
    protocol_message(resolve(json!({"success": true, "worker": {"configs": {}}})));
}

/// **VALUE**: Verifies a non-object `worker.configs` is rejected.
#[test]
fn given_non_object_configs_when_resolved_then_returns_protocol_error() {
    let message = protocol_message(resolve(json!({"success": true, "worker": {"configs": [1]}})));

    assert!(message.contains("not an object"), "message was: {message}");
}
