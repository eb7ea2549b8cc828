//! Per-conversation state: the pending flow step and the last command seen.

use serde::{Deserialize, Serialize};

use crate::market::Amount;

/// Where a conversation is inside a multi-message flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FlowStep {
    #[default]
    Idle,
    AwaitingItemName,
    AwaitingPrice { name: String },
    AwaitingItemKind { name: String, price: Amount },
    AwaitingItemId,
    AwaitingCancelId,
    AwaitingRatedUser,
    AwaitingScore { user_id: i64 },
}

impl FlowStep {
    /// Command whose handler consumes text typed at this step.
    pub fn owner(&self) -> Option<&'static str> {
        match self {
            FlowStep::Idle => None,
            FlowStep::AwaitingItemName
            | FlowStep::AwaitingPrice { .. }
            | FlowStep::AwaitingItemKind { .. } => Some("sell"),
            FlowStep::AwaitingItemId => Some("buy"),
            FlowStep::AwaitingCancelId => Some("cancel"),
            FlowStep::AwaitingRatedUser | FlowStep::AwaitingScore { .. } => Some("rate"),
        }
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            FlowStep::Idle => "idle",
            FlowStep::AwaitingItemName => "awaiting_item_name",
            FlowStep::AwaitingPrice { .. } => "awaiting_price",
            FlowStep::AwaitingItemKind { .. } => "awaiting_item_kind",
            FlowStep::AwaitingItemId => "awaiting_item_id",
            FlowStep::AwaitingCancelId => "awaiting_cancel_id",
            FlowStep::AwaitingRatedUser => "awaiting_rated_user",
            FlowStep::AwaitingScore { .. } => "awaiting_score",
        }
    }
}

/// Small structured record kept per conversation. Stored as JSON in `conversation_state.state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub step: FlowStep,
    #[serde(default)]
    pub last_command: Option<String>,
}

impl ConversationState {
    pub fn at(step: FlowStep) -> Self {
        Self {
            step,
            last_command: None,
        }
    }

    /// Same state with `step` replaced.
    pub fn with_step(&self, step: FlowStep) -> Self {
        Self {
            step,
            last_command: self.last_command.clone(),
        }
    }

    /// Same state with the flow reset to `Idle`.
    pub fn idle(&self) -> Self {
        self.with_step(FlowStep::Idle)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
