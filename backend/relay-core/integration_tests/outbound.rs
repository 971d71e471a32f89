use relay_core::config::AccountConfig;
use relay_core::error::OutboundError;
use relay_core::outbound::{OutboundClient, OutboundText};

use common::RedactedToken;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn message() -> OutboundText {
    OutboundText {
        user_id: "user-7".to_string(),
        task_id: "task-42".to_string(),
        content: "hello back".to_string(),
    }
}

fn client(server: &MockServer) -> OutboundClient {
    OutboundClient::new(
        &format!("{}/send", server.uri()),
        "app-1",
        "agent-1",
        RedactedToken::new("tok-out"),
    )
    .expect("client")
}

/// **VALUE**: Verifies the exact request body of a text reply.
///
/// **WHY THIS MATTERS**: The platform rejects bodies with missing or renamed fields.
///
/// **BUG THIS CATCHES**: Would catch snake_case keys or the token being left out.
#[tokio::test]
async fn given_text_when_sent_then_posts_camel_case_body() {
    // GIVEN: An endpoint expecting one exact body
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(json!({
            "appId": "app-1",
            "agentId": "agent-1",
            "userId": "user-7",
            "taskId": "task-42",
            "accessToken": "tok-out",
            "data": {"content": "hello back"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // WHEN/THEN: Sending succeeds
    client(&server).send_text(&message()).await.expect("send");
}

/// **VALUE**: Verifies a rejected send surfaces the status and is not retried.
#[tokio::test]
async fn given_server_error_when_sent_then_status_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).send_text(&message()).await;

    match result {
        Err(OutboundError::Status {
            status_code,
            message,
            ..
        }) => {
            assert_eq!(status_code.0, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

/// **VALUE**: Verifies an unparsable send URL is rejected at construction.
#[test]
fn given_invalid_url_when_client_built_then_url_parse_error() {
    let result = OutboundClient::new("not a url", "a", "b", RedactedToken::new("t"));

    assert!(matches!(result, Err(OutboundError::UrlParse { .. })));
}

/// **VALUE**: Verifies a client built from account configuration uses that account's
/// identifiers and token.
///
/// **BUG THIS CATCHES**: Would catch appId and agentId being swapped, or the send going
/// to the ingestion URL.
#[tokio::test]
async fn given_account_config_when_client_built_then_sends_with_account_fields() {
    // GIVEN: An account whose sendUrl points at the mock server
    let server = MockServer::start().await;
    let account: AccountConfig = serde_json::from_value(json!({
        "wsUrl": "ws://127.0.0.1:1",
        "accessToken": "tok-account",
        "appId": "app-9",
        "agentId": "agent-9",
        "sendUrl": format!("{}/send", server.uri())
    }))
    .expect("account");

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(json!({
            "appId": "app-9",
            "agentId": "agent-9",
            "userId": "user-7",
            "taskId": "task-42",
            "accessToken": "tok-account",
            "data": {"content": "hello back"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // WHEN: Building from the account and sending
    let client = OutboundClient::from_account(&account).expect("client");

    // THEN: The account's sendUrl is used and the body carries its fields
    assert_eq!(client.send_url().path(), "/send");
    client.send_text(&message()).await.expect("send");
}
