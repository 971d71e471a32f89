use crate::helpers::{CountingRestart, test_identity};

use relay_core::config_sync::identity::lookup_key;
use relay_core::config_sync::{
    RestartHook, SyncSettings, reconcile, spawn_periodic, spawn_reconcile,
};
use relay_core::error::SyncError;

use models::SyncOutcome;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIG_PATH_PATTERN: &str = r"^/config/.+";

fn sync_settings(server: &MockServer, local_path: &Path) -> SyncSettings {
    SyncSettings::new(format!("{}/config/", server.uri()), local_path)
        .with_poll_interval(Duration::from_millis(10))
        .with_max_attempts(Some(3))
        .with_request_timeout(Duration::from_secs(2))
}

fn worker_response(configs: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "worker": {"configs": configs}
    }))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("parse")
}

/// **VALUE**: Verifies a fresh machine receives and stores the remote configuration.
///
/// **WHY THIS MATTERS**: This is the first-start path on every new host.
///
/// **BUG THIS CATCHES**: Would catch the envelope being written instead of `worker.configs`.
#[tokio::test]
async fn given_no_local_config_when_reconciled_then_updated_and_written() {
    // GIVEN: An endpoint with a configuration and no local file
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");

    // WHEN: Reconciling
    let outcome = reconcile(&sync_settings(&server, &local_path), &test_identity(), None)
        .await
        .expect("reconcile");

    // THEN: Updated, file holds the remote configuration
    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(read_json(&local_path), json!({"a": 1}));
}

/// **VALUE**: Verifies equal content with different key order is left alone.
///
/// **WHY THIS MATTERS**: A needless rewrite triggers a restart of the whole relay.
///
/// **BUG THIS CATCHES**: Would catch hashing the raw bytes instead of the canonical form.
#[tokio::test]
async fn given_permuted_local_config_when_reconciled_then_up_to_date_and_untouched() {
    // GIVEN: Local file with the same content in a different key order
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1, "b": {"c": [1, 2], "d": null}})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    let original = r#"{"b":{"d":null,"c":[1,2]},"a":1}"#;
    fs::write(&local_path, original).expect("write");
    let restart = CountingRestart::default();

    // WHEN: Reconciling
    let outcome = reconcile(
        &sync_settings(&server, &local_path),
        &test_identity(),
        Some(&restart),
    )
    .await
    .expect("reconcile");

    // THEN: Up to date, bytes unchanged, no restart
    assert_eq!(outcome, SyncOutcome::UpToDate);
    assert_eq!(fs::read_to_string(&local_path).expect("read"), original);
    assert_eq!(restart.calls(), 0);
}

/// **VALUE**: Verifies the restart hook fires exactly once after an update.
#[tokio::test]
async fn given_changed_config_when_reconciled_then_restart_called_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 2})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    fs::write(&local_path, r#"{"a": 1}"#).expect("write");
    let restart = CountingRestart::default();

    let outcome = reconcile(
        &sync_settings(&server, &local_path),
        &test_identity(),
        Some(&restart),
    )
    .await
    .expect("reconcile");

    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(restart.calls(), 1);
    assert_eq!(read_json(&local_path), json!({"a": 2}));
}

/// **VALUE**: Verifies a failing restart does not change the outcome.
///
/// **WHY THIS MATTERS**: The file is already replaced; the next start picks it up.
#[tokio::test]
async fn given_failing_restart_when_reconciled_then_still_updated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 2})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    let restart = CountingRestart::failing();

    let outcome = reconcile(
        &sync_settings(&server, &local_path),
        &test_identity(),
        Some(&restart),
    )
    .await
    .expect("reconcile");

    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(restart.calls(), 1);
}

/// **VALUE**: Verifies the root-shaped response is stored without envelope fields.
#[tokio::test]
async fn given_root_shaped_response_when_reconciled_then_root_fields_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accounts": {"acme": {"enabled": false}}
        })))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");

    let outcome = reconcile(&sync_settings(&server, &local_path), &test_identity(), None)
        .await
        .expect("reconcile");

    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(
        read_json(&local_path),
        json!({"accounts": {"acme": {"enabled": false}}})
    );
}

/// **VALUE**: Verifies an unreachable endpoint exhausts the attempts with the poll delay
/// between them and leaves the local file untouched.
///
/// **WHY THIS MATTERS**: The relay must still start on its last known configuration.
///
/// **BUG THIS CATCHES**: Would catch missing sleeps (hammering the endpoint), a sleep
/// after the last attempt, or an error escaping instead of `ExhaustedRetries`.
#[tokio::test]
async fn given_unreachable_endpoint_when_reconciled_then_exhausted_after_all_attempts() {
    // GIVEN: Nothing listening, an existing local file
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    fs::write(&local_path, r#"{"keep": true}"#).expect("write");
    let settings = SyncSettings::new("http://127.0.0.1:1/config/", &local_path)
        .with_poll_interval(Duration::from_millis(30))
        .with_max_attempts(Some(3));

    // WHEN: Reconciling
    let started = Instant::now();
    let outcome = reconcile(&settings, &test_identity(), None)
        .await
        .expect("reconcile");
    let elapsed = started.elapsed();

    // THEN: Exhausted after two waits, file unchanged
    assert_eq!(outcome, SyncOutcome::ExhaustedRetries);
    assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
    assert_eq!(
        fs::read_to_string(&local_path).expect("read"),
        r#"{"keep": true}"#
    );
}

/// **VALUE**: Verifies HTTP errors and endpoint-reported failures are retried.
///
/// **BUG THIS CATCHES**: Would catch a 5xx or `success: false` ending the loop early.
#[tokio::test]
async fn given_transient_failures_when_reconciled_then_retried_until_success() {
    // GIVEN: One 503, one success:false, then a good answer
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "warming up"})),
        )
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .with_priority(3)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");

    // WHEN: Reconciling with enough attempts
    let outcome = reconcile(&sync_settings(&server, &local_path), &test_identity(), None)
        .await
        .expect("reconcile");

    // THEN: Third attempt wins
    assert_eq!(outcome, SyncOutcome::Updated);
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 3);
}

/// **VALUE**: Verifies non-JSON bodies count as failed attempts.
#[tokio::test]
async fn given_invalid_json_body_when_reconciled_then_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(3)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");

    let outcome = reconcile(&sync_settings(&server, &local_path), &test_identity(), None)
        .await
        .expect("reconcile");

    assert_eq!(outcome, SyncOutcome::ExhaustedRetries);
    assert!(!local_path.exists());
}

/// **VALUE**: Verifies the request path carries the encoded machine identity.
///
/// **WHY THIS MATTERS**: The endpoint selects the configuration by this key.
#[tokio::test]
async fn given_identity_when_reconciled_then_request_path_ends_with_lookup_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let identity = test_identity();

    reconcile(
        &sync_settings(&server, &dir.path().join("config.json")),
        &identity,
        None,
    )
    .await
    .expect("reconcile");

    let requests = server.received_requests().await.expect("recording enabled");
    let key = lookup_key(&identity).expect("key");
    assert_eq!(requests[0].url.path(), format!("/config/{key}"));
}

/// **VALUE**: Verifies a local write failure is returned and not retried.
///
/// **WHY THIS MATTERS**: Retrying cannot fix a read-only disk; the caller must know.
///
/// **BUG THIS CATCHES**: Would catch resource errors being swallowed as exhausted retries.
#[tokio::test]
async fn given_unwritable_target_when_reconciled_then_resource_error() {
    // GIVEN: The target path is a directory
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    fs::create_dir(&local_path).expect("mkdir");
    fs::write(local_path.join("occupied"), "x").expect("write");

    // WHEN: Reconciling
    let result = reconcile(&sync_settings(&server, &local_path), &test_identity(), None).await;

    // THEN: Resource error, no temp file left next to the target
    assert!(matches!(result, Err(SyncError::Resource { .. })), "got {result:?}");
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("list")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

/// **VALUE**: Verifies the background variant reports the same outcome.
#[tokio::test]
async fn given_spawned_reconcile_when_joined_then_returns_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    let restart = Arc::new(CountingRestart::default());
    let hook: Arc<dyn RestartHook> = restart.clone();

    let outcome = spawn_reconcile(sync_settings(&server, &local_path), test_identity(), Some(hook))
    .await
    .expect("task completes")
    .expect("reconcile");

    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(restart.calls(), 1);
}

/// **VALUE**: Verifies zero attempts means no request at all.
///
/// **BUG THIS CATCHES**: Would catch the attempt limit only being checked after the
/// first fetch, so `Some(0)` still contacts the endpoint.
#[tokio::test]
async fn given_zero_max_attempts_when_reconciled_then_exhausted_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    let settings = sync_settings(&server, &local_path).with_max_attempts(Some(0));

    let outcome = reconcile(&settings, &test_identity(), None)
        .await
        .expect("reconcile");

    assert_eq!(outcome, SyncOutcome::ExhaustedRetries);
    assert!(!local_path.exists());
}

async fn wait_for_requests(server: &MockServer, at_least: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let seen = server
            .received_requests()
            .await
            .expect("recording enabled")
            .len();
        if seen >= at_least {
            return seen;
        }
        assert!(
            Instant::now() < deadline,
            "only {seen} of {at_least} requests arrived"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// **VALUE**: Verifies the periodic schedule survives failed runs and stops on abort.
///
/// **WHY THIS MATTERS**: A disk error on one run must not silently end re-syncing, and
/// shutdown must actually stop the background requests.
///
/// **BUG THIS CATCHES**: Would catch the loop returning on the first `Err`, or a task
/// that keeps polling after its handle is aborted.
#[tokio::test]
async fn given_failing_runs_when_periodic_then_keeps_running_until_aborted() {
    // GIVEN: Every run fails to write because the target is a directory
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    fs::create_dir(&local_path).expect("mkdir");
    fs::write(local_path.join("occupied"), "x").expect("write");
    let settings = sync_settings(&server, &local_path).with_max_attempts(Some(1));

    // WHEN: Running on a short period
    let periodic = spawn_periodic(settings, test_identity(), None, Duration::from_millis(20));

    // THEN: Runs keep coming after failures
    wait_for_requests(&server, 3).await;

    // AND: Abort stops further requests
    periodic.abort();
    let joined = periodic.await;
    assert!(joined.is_err_and(|e| e.is_cancelled()));
    let after_abort = server
        .received_requests()
        .await
        .expect("recording enabled")
        .len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let later = server
        .received_requests()
        .await
        .expect("recording enabled")
        .len();
    assert_eq!(later, after_abort);
}

/// **VALUE**: Verifies periodic runs write once, then find the file up to date.
///
/// **BUG THIS CATCHES**: Would catch every periodic run rewriting the file and
/// restarting the relay on an unchanged configuration.
#[tokio::test]
async fn given_stable_remote_when_periodic_then_single_update_and_restart() {
    // GIVEN: A fixed remote configuration and no local file
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CONFIG_PATH_PATTERN))
        .respond_with(worker_response(json!({"a": 1})))
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("temp dir");
    let local_path = dir.path().join("config.json");
    let restart = Arc::new(CountingRestart::default());
    let hook: Arc<dyn RestartHook> = restart.clone();

    // WHEN: Several periodic runs complete
    let periodic = spawn_periodic(
        sync_settings(&server, &local_path),
        test_identity(),
        Some(hook),
        Duration::from_millis(20),
    );
    wait_for_requests(&server, 3).await;
    periodic.abort();
    let _ = periodic.await;

    // THEN: The file holds the remote configuration and restart ran once
    assert_eq!(read_json(&local_path), json!({"a": 1}));
    assert_eq!(restart.calls(), 1);
}
