//! Integration tests for [`escrow_telegram::TelegramLongPoll`] against a mockito Bot API.
//!
//! Covers: request body (offset, timeout), mixed batches with a malformed update, empty polls,
//! and the status → error mapping (429 retry_after, 401/404 auth, 5xx and bad bodies transient).

use std::time::Duration;

use escrow_core::{Cursor, Inbound, Payload, TransportError, UpdateSource};
use escrow_telegram::{TelegramConfig, TelegramLongPoll};
use mockito::Matcher;
use serde_json::json;

const TEST_BOT_TOKEN: &str = "test_bot_token_12345";

fn get_updates_path() -> String {
    format!("/bot{}/getUpdates", TEST_BOT_TOKEN)
}

fn long_poll(server: &mockito::ServerGuard) -> TelegramLongPoll {
    let config = TelegramConfig::with_token(TEST_BOT_TOKEN)
        .with_api_url(server.url())
        .with_poll_timeout(Duration::from_secs(1))
        .with_http_timeout(Duration::from_secs(5));
    TelegramLongPoll::new(&config).expect("client builds")
}

/// **Test: A batch keeps receipt order, isolates a malformed update, and moves the cursor past all.**
///
/// **Setup:** Mock getUpdates expecting offset 40 and returning updates 40 (text), 41 (no chat),
/// 42 (edited_message).
/// **Action:** `poll(Cursor(40))`.
/// **Expected:** [Event, Malformed(41), Event(Unsupported)]; next cursor 43; mock hit once.
#[tokio::test]
async fn test_poll_parses_batch_with_malformed_update() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", get_updates_path().as_str())
        .match_body(Matcher::PartialJson(json!({"offset": 40, "timeout": 1})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "ok": true,
                "result": [
                    {"update_id": 40, "message": {
                        "message_id": 1, "date": 1706529600,
                        "chat": {"id": 123, "type": "private"},
                        "from": {"id": 123, "is_bot": false, "first_name": "Ann"},
                        "text": "/list"
                    }},
                    {"update_id": 41, "message": {"message_id": 2, "date": 1706529601, "text": "oops"}},
                    {"update_id": 42, "edited_message": {
                        "message_id": 1, "date": 1706529602,
                        "chat": {"id": 123, "type": "private"},
                        "from": {"id": 123, "is_bot": false, "first_name": "Ann"},
                        "text": "/sell"
                    }}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let batch = long_poll(&server).poll(Cursor::new(40)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.next_cursor, Cursor::new(43));
    match &batch.inbound[0] {
        Inbound::Event(event) => {
            assert_eq!(event.update_id, 40);
            assert_eq!(
                event.payload,
                Payload::Command {
                    name: "list".to_string(),
                    args: String::new()
                }
            );
        }
        other => panic!("expected event, got {:?}", other),
    }
    assert!(matches!(
        batch.inbound[1],
        Inbound::Malformed { update_id: 41, .. }
    ));
    match &batch.inbound[2] {
        Inbound::Event(event) => {
            assert_eq!(event.payload, Payload::Unsupported("edited_message".to_string()))
        }
        other => panic!("expected event, got {:?}", other),
    }
}

/// **Test: An empty poll keeps the cursor where it was.**
#[tokio::test]
async fn test_empty_poll_keeps_cursor() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", get_updates_path().as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": []}"#)
        .create_async()
        .await;

    let batch = long_poll(&server).poll(Cursor::new(7)).await.unwrap();

    assert!(batch.is_empty());
    assert_eq!(batch.next_cursor, Cursor::new(7));
}

/// **Test: 429 carries the server's retry_after.**
#[tokio::test]
async fn test_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", get_updates_path().as_str())
        .with_status(429)
        .with_body(
            r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 2", "parameters": {"retry_after": 2}}"#,
        )
        .create_async()
        .await;

    let err = long_poll(&server).poll(Cursor::START).await.unwrap_err();

    assert_eq!(
        err,
        TransportError::RateLimited {
            retry_after: Duration::from_secs(2)
        }
    );
}

/// **Test: 401 and 404 are fatal auth errors.**
#[tokio::test]
async fn test_auth_errors() {
    for status in [401, 404] {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", get_updates_path().as_str())
            .with_status(status)
            .with_body(r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#)
            .create_async()
            .await;

        let err = long_poll(&server).poll(Cursor::START).await.unwrap_err();

        assert!(matches!(err, TransportError::Auth(_)), "status {}", status);
        assert!(err.is_fatal());
    }
}

/// **Test: 5xx and undecodable bodies are transient.**
#[tokio::test]
async fn test_transient_errors() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", get_updates_path().as_str())
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;
    let err = long_poll(&server).poll(Cursor::START).await.unwrap_err();
    assert!(matches!(err, TransportError::TransientNetwork(_)));

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", get_updates_path().as_str())
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;
    let err = long_poll(&server).poll(Cursor::START).await.unwrap_err();
    assert!(matches!(err, TransportError::TransientNetwork(_)));
}

/// **Test: An unreachable endpoint is transient and the error text keeps the token out.**
///
/// **Setup:** Long poll pointed at a closed local port.
/// **Action:** `poll(Cursor::START)`.
/// **Expected:** TransientNetwork whose message does not contain the bot token.
#[tokio::test]
async fn test_connection_refused_is_transient() {
    let config = TelegramConfig::with_token(TEST_BOT_TOKEN)
        .with_api_url("http://127.0.0.1:9")
        .with_poll_timeout(Duration::from_secs(1))
        .with_http_timeout(Duration::from_secs(1));
    let poll = TelegramLongPoll::new(&config).unwrap();

    let err = poll.poll(Cursor::START).await.unwrap_err();

    assert!(matches!(err, TransportError::TransientNetwork(_)));
    assert!(!err.to_string().contains(TEST_BOT_TOKEN), "token leaked: {}", err);
}
