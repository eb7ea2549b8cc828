//! # Dispatcher
//!
//! Routes each event to the handler registered for its command, or to the handler that owns the
//! conversation's current flow step. Handlers never touch the store: they read through a
//! [`Catalog`](escrow_core::Catalog) and return an [`Outcome`](escrow_core::Outcome) holding the
//! replies, the marketplace writes and the next conversation state.

mod context;
mod registry;
pub mod handlers;
pub mod replies;

pub use context::{CommandHandler, Context};
pub use registry::Dispatcher;
