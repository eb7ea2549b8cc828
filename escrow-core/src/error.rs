//! Error types for the escrow bot.
//!
//! Each failure class maps to a recovery policy: [`TransportError`] for the messaging endpoint,
//! [`StoreError`] for the relational store, [`DispatchError`] for a single event. [`EscrowError`]
//! is what the service loop returns when it has to stop.

use std::time::Duration;
use thiserror::Error;

/// Failures talking to the messaging endpoint (polling or sending).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connectivity loss, timeout, 5xx or an undecodable response. Retried with backoff.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// The endpoint asked us to slow down. Retried no sooner than `retry_after`.
    #[error("Rate limited; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Credentials were rejected. Fatal: a retry cannot fix a bad token.
    #[error("Auth error: {0}")]
    Auth(String),

    /// The endpoint refused this particular request (e.g. the user blocked the bot).
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Auth(_))
    }
}

/// Failures of the relational store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection lost, pool exhausted, timeout. Retried with backoff while dispatch pauses.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write broke a constraint. Fatal for that record only: logged and skipped.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Failures while dispatching a single event.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The payload cannot be handled. Skipped, never retried.
    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why the service loop stopped with an error.
#[derive(Error, Debug)]
pub enum EscrowError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
