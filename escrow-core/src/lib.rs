//! # escrow-core
//!
//! Core types and seams for the escrow bot: inbound [`Event`]s and the [`Cursor`] that tracks them,
//! per-conversation [`ConversationState`], dispatch [`Outcome`]s, marketplace records, the error
//! taxonomy, and tracing initialization. Transport- and database-agnostic; used by every other crate.

pub mod bot;
pub mod effect;
pub mod error;
pub mod logger;
pub mod market;
pub mod source;
pub mod state;
pub mod store;
pub mod types;

pub use bot::Bot;
pub use effect::{Effect, Outcome, Reply, Write};
pub use error::{DispatchError, EscrowError, StoreError, TransportError};
pub use logger::init_tracing;
pub use market::{Amount, Catalog, Item, ItemKind, ItemStatus, Transaction, TransactionStatus};
pub use source::UpdateSource;
pub use state::{ConversationState, FlowStep};
pub use store::{CommitOutcome, CommitRequest, OutboxEntry, StateStore};
pub use types::{Batch, ConversationId, Cursor, Event, Inbound, Payload, User};
