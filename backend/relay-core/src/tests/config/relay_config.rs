// Unit tests for RelayConfig load/save/validate

use crate::config::RelayConfig;
use crate::error::ConfigError;

use std::fs;
use std::path::Path;

use tempfile::TempDir;

const SAMPLE: &str = r#"{
    "accounts": {
        "acme": {
            "enabled": true,
            "wsUrl": "wss://chat.example.com",
            "accessToken": "tok-acme",
            "appId": "app-1",
            "agentId": "agent-1",
            "sendUrl": "https://chat.example.com/send",
            "pathSuffix": "/gateway",
            "unknownField": 1
        },
        "dormant": {
            "enabled": false
        }
    }
}"#;

/// **VALUE**: Verifies a missing file loads as an empty configuration.
///
/// **WHY THIS MATTERS**: Before the first sync there is no file yet.
#[test]
fn given_missing_file_when_load_then_returns_defaults() {
    let dir = TempDir::new().expect("temp dir");

    let config = RelayConfig::load(&dir.path().join("config.json")).expect("defaults");

    assert!(config.accounts.is_empty());
}

/// **VALUE**: Verifies camelCase parsing, unknown fields and the enabled filter.
///
/// **BUG THIS CATCHES**: Would catch snake_case field names or disabled accounts starting.
#[test]
fn given_sample_file_when_load_then_enabled_accounts_parsed() {
    // GIVEN: A file with one enabled and one disabled account
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    fs::write(&path, SAMPLE).expect("write");

    // WHEN: Loading
    let config = RelayConfig::load(&path).expect("load");

    // THEN: Both parsed, only one enabled
    assert_eq!(config.accounts.len(), 2);
    let enabled: Vec<&str> = config.enabled_accounts().map(|(id, _)| id).collect();
    assert_eq!(enabled, vec!["acme"]);

    let acme = &config.accounts["acme"];
    assert_eq!(acme.ws_url, "wss://chat.example.com");
    assert_eq!(acme.app_id, "app-1");
    assert_eq!(acme.path_suffix.as_deref(), Some("/gateway"));
}

/// **VALUE**: Verifies account settings carry the suffix and token into ingestion.
#[test]
fn given_account_when_ingest_settings_then_endpoint_built_from_account() {
    let config: RelayConfig = serde_json::from_str(SAMPLE).expect("parse");

    let settings = config.accounts["acme"].ingest_settings("acme");

    assert_eq!(settings.account, "acme");
    let url = settings.endpoint_url().expect("url");
    assert_eq!(
        url.as_str(),
        "wss://chat.example.com/gateway?accessToken=tok-acme"
    );
}

/// **VALUE**: Verifies corrupt files are reported, not silently replaced by defaults.
///
/// **BUG THIS CATCHES**: Would catch a broken file starting the relay with no accounts.
#[test]
fn given_corrupt_file_when_load_then_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    fs::write(&path, "{\"accounts\": [").expect("write");

    assert!(matches!(
        RelayConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

/// **VALUE**: Verifies enabled accounts need a WebSocket URL and a token.
#[test]
fn given_enabled_account_with_http_url_when_validate_then_validation_error() {
    let config: RelayConfig = serde_json::from_str(
        r#"{"accounts": {"bad": {"wsUrl": "https://x", "accessToken": "t"}}}"#,
    )
    .expect("parse");

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidAccount { account, .. }) if account == "bad"
    ));
}

/// **VALUE**: Verifies `enabled` defaults to true when omitted.
#[test]
fn given_account_without_enabled_flag_when_parsed_then_enabled() {
    let config: RelayConfig = serde_json::from_str(
        r#"{"accounts": {"a": {"wsUrl": "ws://x", "accessToken": ""}}}"#,
    )
    .expect("parse");

    assert!(config.accounts["a"].enabled);
    assert!(config.validate().is_err(), "blank token must fail validation");
}

/// **VALUE**: Verifies save then load returns the same accounts and leaves no temp file.
#[test]
fn given_config_when_saved_then_loads_back() {
    let dir = TempDir::new().expect("temp dir");
    let nested = dir.path().join("nested");
    let path = nested.join("config.json");
    let config: RelayConfig = serde_json::from_str(SAMPLE).expect("parse");

    config.save(&path).expect("save");
    let loaded = RelayConfig::load(&path).expect("load");

    assert_eq!(loaded.accounts.len(), 2);
    assert_eq!(loaded.accounts["acme"].access_token, "tok-acme");
    assert_eq!(temp_files_in(&nested), Vec::<String>::new());
}

/// **VALUE**: Verifies concurrent saves to one path never collide on a temp file.
///
/// **WHY THIS MATTERS**: An operator edit and a sync can land at the same moment.
///
/// **BUG THIS CATCHES**: Would catch a fixed `<path>.tmp` name, where one writer
/// renames the other's half-written file or fails with "not found".
#[test]
fn given_concurrent_saves_when_both_finish_then_both_succeed_without_leftovers() {
    // GIVEN: Two configurations aimed at the same file
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    let first: RelayConfig = serde_json::from_str(SAMPLE).expect("parse");
    let second = RelayConfig::default();

    // WHEN: Saving both from separate threads, many times
    let results: Vec<_> = std::thread::scope(|scope| {
        let a = scope.spawn(|| (0..25).map(|_| first.save(&path)).collect::<Vec<_>>());
        let b = scope.spawn(|| (0..25).map(|_| second.save(&path)).collect::<Vec<_>>());
        let mut results = a.join().expect("thread a");
        results.extend(b.join().expect("thread b"));
        results
    });

    // THEN: Every save succeeded, the file parses, nothing is left behind
    assert!(results.iter().all(Result::is_ok), "{results:?}");
    let loaded = RelayConfig::load(&path).expect("load");
    assert!(loaded.accounts.is_empty() || loaded.accounts.len() == 2);
    assert_eq!(temp_files_in(dir.path()), Vec::<String>::new());
}

/// **VALUE**: Verifies one broken account does not take the others down.
///
/// **WHY THIS MATTERS**: The file is replaced wholesale by remote sync, so a single
/// bad entry from upstream must not stop every connection on restart.
///
/// **BUG THIS CATCHES**: Would catch load validating the whole document and failing.
#[test]
fn given_one_invalid_enabled_account_when_load_then_only_that_account_skipped() {
    // GIVEN: One good account, one enabled with an http URL, one malformed entry,
    // and a disabled incomplete one
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"accounts": {
            "good": {"wsUrl": "wss://chat.example.com", "accessToken": "t"},
            "bad": {"wsUrl": "https://oops", "accessToken": "t"},
            "mangled": {"enabled": "yes"},
            "dormant": {"enabled": false}
        }}"#,
    )
    .expect("write");

    // WHEN: Loading
    let config = RelayConfig::load(&path).expect("load");

    // THEN: Only the bad and mangled entries are dropped
    let ids: Vec<&str> = config.accounts.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["dormant", "good"]);
    let enabled: Vec<&str> = config.enabled_accounts().map(|(id, _)| id).collect();
    assert_eq!(enabled, vec!["good"]);
}

/// **VALUE**: Verifies a document whose `accounts` is not a map is a parse error.
#[test]
fn given_accounts_not_a_map_when_load_then_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"accounts": "x"}"#).expect("write");

    assert!(matches!(
        RelayConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

fn temp_files_in(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

/// **VALUE**: Verifies Debug output never includes the token.
#[test]
fn given_account_when_debug_formatted_then_token_redacted() {
    let config: RelayConfig = serde_json::from_str(SAMPLE).expect("parse");

    let debug = format!("{config:?}");

    assert!(!debug.contains("tok-acme"));
    assert!(debug.contains("[REDACTED]"));
}
