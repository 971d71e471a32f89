use crate::error::IngestError;
use crate::ingest::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RECONNECT_DELAY, IngestSettings};

use common::RedactedToken;

fn settings(base_url: &str, token: &str) -> IngestSettings {
    IngestSettings::new("acme", base_url, RedactedToken::new(token))
}

/// **VALUE**: Verifies the endpoint joins base, suffix and the token query parameter.
#[test]
fn given_base_url_when_endpoint_url_then_suffix_and_token_appended() {
    let url = settings("wss://chat.example.com", "tok-123")
        .endpoint_url()
        .expect("url");

    assert_eq!(url.as_str(), "wss://chat.example.com/ws?accessToken=tok-123");
}

/// **VALUE**: Verifies a custom suffix and a trailing slash on the base.
#[test]
fn given_custom_suffix_when_endpoint_url_then_single_slash_join() {
    let url = settings("ws://127.0.0.1:9000/", "t")
        .with_path_suffix("/gateway/v2")
        .endpoint_url()
        .expect("url");

    assert_eq!(url.as_str(), "ws://127.0.0.1:9000/gateway/v2?accessToken=t");
}

/// **VALUE**: Verifies the token is query-encoded.
///
/// **BUG THIS CATCHES**: Would catch tokens with `&` or `=` splitting the query.
#[test]
fn given_token_with_reserved_chars_when_endpoint_url_then_encoded() {
    let url = settings("wss://chat.example.com", "a&b=c")
        .endpoint_url()
        .expect("url");

    let (_, token) = url.query_pairs().next().expect("one pair");
    assert_eq!(token, "a&b=c");
}

/// **VALUE**: Verifies unusable endpoints are rejected before any task starts.
///
/// **WHY THIS MATTERS**: These are the only fatal start conditions.
#[test]
fn given_bad_endpoint_when_endpoint_url_then_endpoint_error() {
    let cases = [
        settings("not a url", "t"),
        settings("https://chat.example.com", "t"),
        settings("wss://chat.example.com", "   "),
    ];

    for case in cases {
        let result = case.endpoint_url();
        assert!(
            matches!(result, Err(IngestError::Endpoint { .. })),
            "base {} gave {result:?}",
            case.base_url
        );
    }
}

/// **VALUE**: Verifies the loggable endpoint never carries the token.
#[test]
fn given_settings_when_display_endpoint_then_token_absent() {
    let settings = settings("wss://chat.example.com", "secret-token");

    assert!(!settings.display_endpoint().contains("secret-token"));
    assert!(!format!("{settings:?}").contains("secret-token"));
}

/// **VALUE**: Verifies the default timings.
#[test]
fn given_new_settings_then_defaults_applied() {
    let settings = settings("wss://chat.example.com", "t");

    assert_eq!(settings.path_suffix, "/ws");
    assert_eq!(settings.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
    assert_eq!(settings.reconnect_delay, DEFAULT_RECONNECT_DELAY);
}
