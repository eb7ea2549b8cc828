//! # escrow-bot
//!
//! Application crate: configuration, CLI, the service loop (poll → dispatch → commit → deliver),
//! its lifecycle state machine, backoff, liveness endpoint and signal handling.

pub mod backoff;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod health;
pub mod lifecycle;
pub mod poller;
pub mod runner;
pub mod service;
pub mod shutdown;

pub use backoff::{Backoff, BackoffPolicy};
pub use cli::{Cli, Commands};
pub use config::BotConfig;
pub use delivery::{DeliveryReport, OutboxDelivery};
pub use lifecycle::{Lifecycle, ServiceState};
pub use poller::{poll_with_retry, PollOutcome};
pub use runner::{load_config, run_bot};
pub use service::EscrowService;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
