//! Escrow flow: /buy opens a pending transaction, /cancel withdraws an item, /confirm settles.

use async_trait::async_trait;
use escrow_core::{DispatchError, FlowStep, ItemStatus, Outcome, Write};
use tracing::info;

use super::parse_id;
use crate::context::{CommandHandler, Context};
use crate::replies;

/// `/buy [item id]`: reserves an available item for the sender and notifies the seller.
pub struct BuyHandler;

impl BuyHandler {
    async fn offer(&self, ctx: &Context<'_>, text: &str) -> Result<Outcome, DispatchError> {
        let asking = ctx.state.with_step(FlowStep::AwaitingItemId);
        let Some(item_id) = parse_id(text) else {
            return Ok(ctx.respond(asking, replies::INVALID_ITEM_ID));
        };
        let item = match ctx.catalog.item(item_id).await? {
            Some(item) if item.status == ItemStatus::Available => item,
            _ => return Ok(ctx.respond(asking, replies::INVALID_ITEM_ID)),
        };
        let buyer_id = ctx.user_id();
        if item.seller_id == buyer_id {
            return Ok(ctx.respond(asking, replies::OWN_ITEM));
        }

        info!(item_id, buyer_id, seller_id = item.seller_id, "Purchase requested");
        // Private chat ids equal user ids, so the seller is reached at their user id.
        Ok(ctx
            .finish(replies::purchase_requested(&item))
            .reply(
                item.seller_id,
                replies::with_guide(&replies::purchase_offer(&item, buyer_id)),
            )
            .write(Write::OpenTransaction {
                item_id: item.id,
                buyer_id,
                seller_id: item.seller_id,
                amount: item.price,
            }))
    }
}

#[async_trait]
impl CommandHandler for BuyHandler {
    fn command(&self) -> &'static str {
        "buy"
    }

    async fn on_command(&self, ctx: &Context<'_>, args: &str) -> Result<Outcome, DispatchError> {
        if args.is_empty() {
            return Ok(ctx.respond(
                ctx.state.with_step(FlowStep::AwaitingItemId),
                replies::ASK_BUY_ID,
            ));
        }
        self.offer(ctx, args).await
    }

    async fn on_input(&self, ctx: &Context<'_>, text: &str) -> Result<Outcome, DispatchError> {
        self.offer(ctx, text).await
    }
}

/// `/cancel`: deletes one of the sender's own items that is still available.
pub struct CancelHandler;

#[async_trait]
impl CommandHandler for CancelHandler {
    fn command(&self) -> &'static str {
        "cancel"
    }

    async fn on_command(&self, ctx: &Context<'_>, _args: &str) -> Result<Outcome, DispatchError> {
        Ok(ctx.respond(
            ctx.state.with_step(FlowStep::AwaitingCancelId),
            replies::ASK_CANCEL_ID,
        ))
    }

    async fn on_input(&self, ctx: &Context<'_>, text: &str) -> Result<Outcome, DispatchError> {
        let Some(item_id) = parse_id(text) else {
            return Ok(ctx.reprompt(replies::INVALID_ID));
        };
        let seller_id = ctx.user_id();
        match ctx.catalog.item(item_id).await? {
            Some(item) if item.seller_id == seller_id && item.status == ItemStatus::Available => {
                Ok(ctx
                    .finish(replies::item_deleted(item_id))
                    .write(Write::DeleteItem { item_id, seller_id }))
            }
            _ => Ok(ctx.reprompt(replies::INVALID_ITEM_ID)),
        }
    }
}

/// `/confirm <item id>`: the seller confirms payment; the item is sold and the buyer notified.
pub struct ConfirmHandler;

#[async_trait]
impl CommandHandler for ConfirmHandler {
    fn command(&self) -> &'static str {
        "confirm"
    }

    async fn on_command(&self, ctx: &Context<'_>, args: &str) -> Result<Outcome, DispatchError> {
        let Some(item_id) = parse_id(args) else {
            return Ok(ctx.finish(replies::CONFIRM_USAGE));
        };
        let seller_id = ctx.user_id();
        let item = match ctx.catalog.item(item_id).await? {
            Some(item) if item.seller_id == seller_id => item,
            _ => return Ok(ctx.finish(replies::INVALID_ITEM_ID)),
        };
        let Some(transaction) = ctx.catalog.pending_transaction_for_item(item_id).await? else {
            return Ok(ctx.finish(replies::no_pending_transaction(item_id)));
        };

        info!(
            item_id,
            transaction_id = transaction.id,
            buyer_id = transaction.buyer_id,
            "Payment confirmed"
        );
        Ok(ctx
            .finish(replies::transaction_completed(transaction.id, &item))
            .reply(
                transaction.buyer_id,
                replies::with_guide(&replies::payment_confirmed(transaction.id, &item)),
            )
            .write(Write::CompleteTransaction { item_id, seller_id }))
    }
}
