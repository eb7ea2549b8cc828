//! Single-message commands: /start, /list, /chat, /exit.

use async_trait::async_trait;
use escrow_core::{DispatchError, Outcome};

use crate::context::{CommandHandler, Context};
use crate::replies;

pub struct StartHandler;

#[async_trait]
impl CommandHandler for StartHandler {
    fn command(&self) -> &'static str {
        "start"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["help"]
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        Ok(ctx.finish(replies::WELCOME))
    }
}

pub struct ListHandler;

#[async_trait]
impl CommandHandler for ListHandler {
    fn command(&self) -> &'static str {
        "list"
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        let items = ctx.catalog.available_items().await?;
        if items.is_empty() {
            return Ok(ctx.finish(replies::NO_ITEMS));
        }
        Ok(ctx.finish(replies::item_list(&items)))
    }
}

/// Relay itself is not implemented; the command only explains it.
pub struct ChatHandler;

#[async_trait]
impl CommandHandler for ChatHandler {
    fn command(&self) -> &'static str {
        "chat"
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        Ok(ctx.finish(replies::SAFE_CHAT))
    }
}

pub struct ExitHandler;

#[async_trait]
impl CommandHandler for ExitHandler {
    fn command(&self) -> &'static str {
        "exit"
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        Ok(ctx.finish(replies::BACK_TO_START))
    }
}
