use async_trait::async_trait;
use escrow_core::{Amount, DispatchError, FlowStep, ItemKind, Outcome, Write};
use tracing::info;

use crate::context::{CommandHandler, Context};
use crate::replies;

/// `/sell`: name, then price, then kind; the last answer lists the item.
pub struct SellHandler;

#[async_trait]
impl CommandHandler for SellHandler {
    fn command(&self) -> &'static str {
        "sell"
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        Ok(ctx.respond(
            ctx.state.with_step(FlowStep::AwaitingItemName),
            replies::ASK_ITEM_NAME,
        ))
    }

    async fn on_input(&self, ctx: &Context<'_>, text: &str) -> Result<Outcome, DispatchError> {
        match &ctx.state.step {
            FlowStep::AwaitingItemName => Ok(ctx.respond(
                ctx.state.with_step(FlowStep::AwaitingPrice {
                    name: text.to_string(),
                }),
                replies::ASK_PRICE,
            )),
            FlowStep::AwaitingPrice { name } => match text.parse::<Amount>() {
                Ok(price) => Ok(ctx.respond(
                    ctx.state.with_step(FlowStep::AwaitingItemKind {
                        name: name.clone(),
                        price,
                    }),
                    replies::ASK_ITEM_KIND,
                )),
                Err(e) => {
                    info!(error = %e, "Rejected price input");
                    Ok(ctx.reprompt(replies::INVALID_PRICE))
                }
            },
            FlowStep::AwaitingItemKind { name, price } => {
                let Some(kind) = ItemKind::parse(text) else {
                    return Ok(ctx.reprompt(replies::INVALID_ITEM_KIND));
                };
                Ok(ctx
                    .finish(replies::item_registered(name, *price))
                    .write(Write::CreateItem {
                        name: name.clone(),
                        price: *price,
                        seller_id: ctx.user_id(),
                        kind,
                    }))
            }
            _ => Ok(Outcome::new(ctx.state.idle())),
        }
    }
}
