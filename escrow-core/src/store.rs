//! The State Store seam: cursor, per-conversation state, outbox, all committed atomically.

use async_trait::async_trait;

use crate::effect::{Reply, Write};
use crate::error::StoreError;
use crate::state::ConversationState;
use crate::types::{ConversationId, Cursor};

/// Everything one event changes, committed in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub conversation_id: ConversationId,
    pub state: ConversationState,
    pub cursor: Cursor,
    pub writes: Vec<Write>,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// The stored cursor was already at or past the request's cursor; nothing was written.
    AlreadyApplied,
}

/// A committed reply waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: i64,
    pub reply: Reply,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last committed cursor, or [`Cursor::START`] on first run.
    async fn committed_cursor(&self) -> Result<Cursor, StoreError>;

    /// State of a conversation; the default state when none is stored.
    async fn load_state(&self, conversation_id: &ConversationId)
        -> Result<ConversationState, StoreError>;

    /// Applies writes, stores state, enqueues replies and advances the cursor in one transaction.
    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError>;

    /// Moves the cursor forward without touching any conversation (skipped events).
    async fn advance_cursor(&self, cursor: Cursor) -> Result<(), StoreError>;

    /// Oldest undelivered replies first.
    async fn pending_replies(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError>;

    async fn mark_delivered(&self, entry_id: i64) -> Result<(), StoreError>;
}
