//! Storage crate: relational persistence for the escrow bot.
//!
//! ## Modules
//!
//! - [`pool`] – DbPoolManager, Backend, StoreOptions, redact_url
//! - `schema` – table creation per backend
//! - `sql_store` – SqlStore: StateStore + Catalog over one pool
//! - `error` – sqlx error mapping onto StoreError

mod error;
pub mod pool;
mod schema;
mod sql_store;

pub use pool::{redact_url, Backend, DbPoolManager, StoreOptions};
pub use sql_store::SqlStore;
