//! # escrow-telegram
//!
//! Telegram transport for the escrow bot: [`TelegramLongPoll`] implements
//! [`escrow_core::UpdateSource`] over `getUpdates`, [`TelegramBotAdapter`] implements
//! [`escrow_core::Bot`] over teloxide. No dispatch or persistence logic lives here.

mod adapters;
mod bot_adapter;
mod config;
mod long_poll;

pub use adapters::inbound_from_update;
pub use bot_adapter::TelegramBotAdapter;
pub use config::TelegramConfig;
pub use long_poll::TelegramLongPoll;
