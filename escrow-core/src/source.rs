//! The Poll Loop seam: anything that yields batches of inbound events after a cursor.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{Batch, Cursor};

/// Source of inbound events (e.g. Telegram `getUpdates`).
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Returns the entries after `cursor`, in receipt order, and the cursor past them.
    /// Has no side effects besides network I/O; acknowledging is done by polling with a later cursor.
    async fn poll(&self, cursor: Cursor) -> Result<Batch, TransportError>;
}
