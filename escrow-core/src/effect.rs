//! Dispatch output: outbound replies and marketplace writes, plus the next conversation state.

use serde::{Deserialize, Serialize};

use crate::market::{Amount, ItemKind};
use crate::state::ConversationState;

/// A text message to send once the event is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
}

/// A marketplace write, applied in the same transaction as the event's state and cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Write {
    CreateItem {
        name: String,
        price: Amount,
        seller_id: i64,
        kind: ItemKind,
    },
    /// Deletes the seller's own item while it is still available.
    DeleteItem { item_id: i64, seller_id: i64 },
    /// Opens a pending transaction and reserves the item.
    OpenTransaction {
        item_id: i64,
        buyer_id: i64,
        seller_id: i64,
        amount: Amount,
    },
    /// Completes the pending transaction on the item and marks it sold.
    CompleteTransaction { item_id: i64, seller_id: i64 },
    RecordRating {
        user_id: i64,
        rater_id: i64,
        score: i64,
        review: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Reply(Reply),
    Write(Write),
}

/// What dispatching one event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub state: ConversationState,
}

impl Outcome {
    /// No effects; the conversation moves to `state`.
    pub fn new(state: ConversationState) -> Self {
        Self {
            effects: Vec::new(),
            state,
        }
    }

    pub fn reply(mut self, chat_id: i64, text: impl Into<String>) -> Self {
        self.effects.push(Effect::Reply(Reply {
            chat_id,
            text: text.into(),
        }));
        self
    }

    pub fn write(mut self, write: Write) -> Self {
        self.effects.push(Effect::Write(write));
        self
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Reply(reply) => Some(reply.clone()),
                Effect::Write(_) => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Write(write) => Some(write.clone()),
                Effect::Reply(_) => None,
            })
            .collect()
    }
}
