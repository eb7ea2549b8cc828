//! The service loop: poll a batch, dispatch each event in receipt order, commit it together with
//! the cursor, then deliver its replies.
//!
//! Each event is committed in its own transaction, so a crash loses at most the uncommitted tail
//! of the current batch, which the next run re-polls from the stored cursor. Store outages pause
//! dispatch and retry the same event with backoff; only a fatal transport error ends the loop.
//! Replies whose delivery was deferred are retried after every poll once their retry time passes.

use std::sync::Arc;

use dispatcher::{replies, Dispatcher};
use escrow_core::{
    Bot, Catalog, CommitOutcome, CommitRequest, ConversationState, Cursor, DispatchError,
    EscrowError, Event, Inbound, Reply, StateStore, StoreError, UpdateSource,
};
use tracing::{debug, info, instrument, warn};

use crate::backoff::BackoffPolicy;
use crate::delivery::OutboxDelivery;
use crate::lifecycle::{Lifecycle, ServiceState};
use crate::poller::{poll_with_retry, PollOutcome};
use crate::shutdown::Shutdown;

/// Result of handling one inbound entry.
struct Processed {
    /// Cursor now committed.
    cursor: Cursor,
    /// New replies are waiting in the outbox.
    has_replies: bool,
}

pub struct EscrowService {
    source: Arc<dyn UpdateSource>,
    store: Arc<dyn StateStore>,
    catalog: Arc<dyn Catalog>,
    dispatcher: Dispatcher,
    delivery: OutboxDelivery,
    lifecycle: Lifecycle,
    backoff: BackoffPolicy,
}

impl EscrowService {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        bot: Arc<dyn Bot>,
        store: Arc<dyn StateStore>,
        catalog: Arc<dyn Catalog>,
        dispatcher: Dispatcher,
        lifecycle: Lifecycle,
        backoff: BackoffPolicy,
    ) -> Self {
        let delivery = OutboxDelivery::new(store.clone(), bot).with_backoff(backoff);
        Self {
            source,
            store,
            catalog,
            dispatcher,
            delivery,
            lifecycle,
            backoff,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Runs until shutdown fires (`Ok`) or a fatal error occurs (`Err`).
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<(), EscrowError> {
        let result = self.run_loop(&mut shutdown).await;
        self.lifecycle.transition(ServiceState::ShuttingDown);

        match &result {
            Ok(()) => {
                if let Err(e) = self.delivery.flush().await {
                    warn!(error = %e, "Final outbox flush failed");
                }
                info!("Service stopped");
            }
            Err(e) => warn!(error = %e, "Service stopped with a fatal error"),
        }
        self.lifecycle.transition(ServiceState::Stopped);
        result
    }

    async fn run_loop(&self, shutdown: &mut Shutdown) -> Result<(), EscrowError> {
        let Some(mut cursor) = self.load_cursor(shutdown).await else {
            return Ok(());
        };
        info!(cursor = %cursor, "Service started");
        self.delivery.flush().await?;

        loop {
            let outcome = poll_with_retry(
                self.source.as_ref(),
                cursor,
                &self.backoff,
                &self.lifecycle,
                shutdown,
            )
            .await?;
            let batch = match outcome {
                PollOutcome::Batch(batch) => batch,
                PollOutcome::Shutdown => return Ok(()),
            };
            // Idle polls still retry replies left queued by an earlier failed send.
            if self.delivery.is_deferred() {
                self.delivery.flush().await?;
            }
            if batch.is_empty() {
                continue;
            }

            self.lifecycle.transition(ServiceState::Dispatching);
            for entry in &batch.inbound {
                // Shutdown lets the current event finish; the rest is re-polled on restart.
                if shutdown.is_triggered() {
                    info!(cursor = %cursor, "Shutdown requested, leaving the rest of the batch");
                    return Ok(());
                }
                let Some(processed) = self.process_with_retry(entry, cursor, shutdown).await else {
                    return Ok(());
                };
                cursor = processed.cursor;
                if processed.has_replies {
                    self.delivery.flush().await?;
                }
            }
        }
    }

    /// Reads the committed cursor, retrying while the store is unavailable. `None` on shutdown.
    async fn load_cursor(&self, shutdown: &mut Shutdown) -> Option<Cursor> {
        let mut backoff = self.backoff.start();
        loop {
            match self.store.committed_cursor().await {
                Ok(cursor) => return Some(cursor),
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Failed to read committed cursor, retrying"
                    );
                    if !shutdown.sleep(delay).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Processes one entry, retrying the whole dispatch-and-commit while the store is unavailable.
    /// `None` when shutdown fires during the wait.
    async fn process_with_retry(
        &self,
        entry: &Inbound,
        committed: Cursor,
        shutdown: &mut Shutdown,
    ) -> Option<Processed> {
        let mut backoff = self.backoff.start();
        loop {
            match self.process(entry, committed).await {
                Ok(processed) => {
                    self.lifecycle.transition(ServiceState::Dispatching);
                    return Some(processed);
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        update_id = entry.update_id(),
                        error = %e,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Store unavailable, pausing dispatch"
                    );
                    self.lifecycle.transition(ServiceState::Backoff);
                    if !shutdown.sleep(delay).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Dispatches and commits one entry. Only [`StoreError::Unavailable`] is returned; every
    /// per-event failure is logged and skipped with the cursor advanced.
    async fn process(&self, entry: &Inbound, committed: Cursor) -> Result<Processed, StoreError> {
        let update_id = entry.update_id();
        if committed.covers(update_id) {
            debug!(update_id, cursor = %committed, "Skipping already committed update");
            return Ok(Processed {
                cursor: committed,
                has_replies: false,
            });
        }
        let cursor = committed.advance_past(update_id);

        let event = match entry {
            Inbound::Event(event) => event,
            Inbound::Malformed { reason, .. } => {
                warn!(update_id, reason = %reason, "Skipping malformed update");
                return self.skip(cursor).await;
            }
        };

        let state = self.store.load_state(&event.conversation_id).await?;
        let outcome = match self
            .dispatcher
            .dispatch(event, &state, self.catalog.as_ref())
            .await
        {
            Ok(outcome) => outcome,
            Err(DispatchError::Malformed(reason)) => {
                warn!(update_id, reason = %reason, "Skipping malformed event");
                return self.skip(cursor).await;
            }
            Err(DispatchError::Store(StoreError::ConstraintViolation(reason))) => {
                warn!(update_id, reason = %reason, "Constraint violation during dispatch");
                return self.commit_error_reply(event, &state, cursor).await;
            }
            Err(DispatchError::Store(e)) => return Err(e),
        };

        let request = CommitRequest {
            conversation_id: event.conversation_id.clone(),
            state: outcome.state.clone(),
            cursor,
            writes: outcome.writes(),
            replies: outcome.replies(),
        };
        let has_replies = !request.replies.is_empty();
        match self.store.commit(request).await {
            Ok(CommitOutcome::Applied) => {
                info!(
                    update_id,
                    conversation_id = %event.conversation_id,
                    step = outcome.state.step.name(),
                    "Event committed"
                );
                Ok(Processed {
                    cursor,
                    has_replies,
                })
            }
            Ok(CommitOutcome::AlreadyApplied) => {
                info!(update_id, "Event was already committed, nothing applied");
                Ok(Processed {
                    cursor,
                    has_replies: false,
                })
            }
            Err(StoreError::ConstraintViolation(reason)) => {
                warn!(
                    update_id,
                    conversation_id = %event.conversation_id,
                    reason = %reason,
                    "Event rejected by a store constraint, skipping its writes"
                );
                self.commit_error_reply(event, &state, cursor).await
            }
            Err(e) => Err(e),
        }
    }

    /// Advances the cursor past a skipped entry.
    async fn skip(&self, cursor: Cursor) -> Result<Processed, StoreError> {
        self.store.advance_cursor(cursor).await?;
        Ok(Processed {
            cursor,
            has_replies: false,
        })
    }

    /// Ends the sender's flow with an error reply instead of the rejected writes.
    async fn commit_error_reply(
        &self,
        event: &Event,
        state: &ConversationState,
        cursor: Cursor,
    ) -> Result<Processed, StoreError> {
        let request = CommitRequest {
            conversation_id: event.conversation_id.clone(),
            state: state.idle(),
            cursor,
            writes: Vec::new(),
            replies: vec![Reply {
                chat_id: event.chat_id,
                text: replies::with_guide(replies::SOMETHING_WENT_WRONG),
            }],
        };
        match self.store.commit(request).await {
            Ok(outcome) => Ok(Processed {
                cursor,
                has_replies: outcome == CommitOutcome::Applied,
            }),
            Err(StoreError::ConstraintViolation(reason)) => {
                warn!(update_id = event.update_id, reason = %reason, "Error reply rejected too, skipping event");
                self.skip(cursor).await
            }
            Err(e) => Err(e),
        }
    }
}
