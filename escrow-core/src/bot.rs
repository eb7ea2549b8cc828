//! Outbound message abstraction.
//!
//! [`Bot`] is transport-agnostic; the Telegram implementation lives in escrow-telegram.

use async_trait::async_trait;

use crate::error::TransportError;

/// Sends text messages. Implementations map to a transport (e.g. Telegram).
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a text message to the given chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}
