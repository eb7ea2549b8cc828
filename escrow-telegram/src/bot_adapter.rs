//! Wraps teloxide::Bot and implements [`escrow_core::Bot`]. Tests substitute another Bot impl.

use async_trait::async_trait;
use escrow_core::{Bot as CoreBot, TransportError};
use teloxide::{prelude::*, types::ChatId, ApiError, RequestError};
use tracing::error;

use crate::config::TelegramConfig;

/// Thin wrapper around teloxide::Bot that implements escrow-core's Bot trait.
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    /// Creates an adapter from an existing teloxide Bot.
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// Builds the teloxide Bot from the transport config, pointing it at `api_url`.
    pub fn from_config(config: &TelegramConfig) -> Self {
        let bot = teloxide::Bot::new(config.bot_token.clone());
        let bot = match reqwest::Url::parse(&config.api_url) {
            Ok(url) => bot.set_api_url(url),
            Err(e) => {
                error!(error = %e, url = %config.api_url, "Invalid Telegram API URL, using default");
                bot
            }
        };
        Self::new(bot)
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.bot
            .send_message(ChatId(chat_id), text.to_string())
            .await
            .map_err(transport_error)?;
        Ok(())
    }
}

/// Maps a teloxide request failure to the transport taxonomy.
fn transport_error(e: RequestError) -> TransportError {
    match e {
        RequestError::RetryAfter(seconds) => TransportError::RateLimited {
            retry_after: seconds.duration(),
        },
        RequestError::Api(ApiError::InvalidToken) => {
            TransportError::Auth("sendMessage rejected the bot token".to_string())
        }
        // Descriptions teloxide does not recognize are mostly server-side hiccups.
        RequestError::Api(ApiError::Unknown(description)) => TransportError::TransientNetwork(
            format!("sendMessage failed: {}", description),
        ),
        RequestError::Api(api) => TransportError::Rejected(api.to_string()),
        RequestError::MigrateToChatId(chat) => {
            TransportError::Rejected(format!("group migrated to chat {}", chat.0))
        }
        other => TransportError::TransientNetwork(other.to_string()),
    }
}
