//! `getUpdates` long-poll client.

use std::time::Duration;

use async_trait::async_trait;
use escrow_core::{Batch, Cursor, TransportError, UpdateSource};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::adapters::inbound_from_update;
use crate::config::TelegramConfig;

/// Update kinds requested from the Bot API. Everything but `message` is skipped as unsupported.
const ALLOWED_UPDATES: &[&str] = &["message", "edited_message", "callback_query"];

/// Delay used when a 429 carries no `retry_after`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Long-polls the Bot API for updates starting at a cursor.
pub struct TelegramLongPoll {
    client: reqwest::Client,
    url: String,
    poll_timeout_secs: u64,
}

impl TelegramLongPoll {
    pub fn new(config: &TelegramConfig) -> reqwest::Result<Self> {
        // The HTTP timeout must outlive the server-side long-poll wait.
        let client = reqwest::Client::builder()
            .timeout(config.poll_timeout + config.http_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.method_url("getUpdates"),
            poll_timeout_secs: config.poll_timeout.as_secs(),
        })
    }
}

#[async_trait]
impl UpdateSource for TelegramLongPoll {
    #[instrument(skip_all, fields(cursor = %cursor))]
    async fn poll(&self, cursor: Cursor) -> Result<Batch, TransportError> {
        let body = json!({
            "offset": cursor.value(),
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ALLOWED_UPDATES,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("getUpdates request failed", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| network_error("getUpdates body read failed", e))?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(status_error(status, parsed));
        }
        let Some(parsed) = parsed else {
            return Err(TransportError::TransientNetwork(
                "getUpdates returned an undecodable body".to_string(),
            ));
        };
        if !parsed.ok {
            return Err(TransportError::TransientNetwork(format!(
                "getUpdates returned ok: false ({})",
                parsed.description.unwrap_or_default()
            )));
        }

        let updates = parsed.result.unwrap_or_default();
        let inbound: Vec<_> = updates.iter().filter_map(inbound_from_update).collect();
        let batch = Batch::new(cursor, inbound);
        if batch.is_empty() {
            debug!("getUpdates returned no updates");
        } else {
            info!(
                updates = batch.len(),
                next_cursor = %batch.next_cursor,
                "getUpdates returned updates"
            );
        }
        Ok(batch)
    }
}

/// The request URL carries the bot token, so it is stripped before formatting.
fn network_error(context: &str, e: reqwest::Error) -> TransportError {
    TransportError::TransientNetwork(format!("{}: {}", context, e.without_url()))
}

/// Maps a non-2xx `getUpdates` response to the transport taxonomy.
fn status_error(status: StatusCode, body: Option<ApiResponse>) -> TransportError {
    let description = body
        .as_ref()
        .and_then(|b| b.description.clone())
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = body
                .and_then(|b| b.parameters)
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            TransportError::RateLimited { retry_after }
        }
        // Telegram answers 404 for an unknown token and 401/403 for a revoked one.
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            TransportError::Auth(format!("getUpdates rejected the token: {}", description))
        }
        _ => TransportError::TransientNetwork(format!(
            "getUpdates failed: {} {}",
            status, description
        )),
    }
}
