//! Outbox delivery: sends committed replies and removes them once Telegram accepts them.
//!
//! Replies are at-least-once: an entry stays queued until sent or permanently rejected, and a
//! crash between send and delete resends it on the next flush.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use escrow_core::{Bot, StateStore, TransportError};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backoff::{Backoff, BackoffPolicy};

const DEFAULT_BATCH_SIZE: i64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Permanently rejected and removed (e.g. the user blocked the bot).
    pub dropped: usize,
    /// True when the outbox still holds replies that wait for a later flush.
    pub deferred: bool,
}

/// Pending retry after a deferred flush.
struct Retry {
    backoff: Backoff,
    not_before: Instant,
}

pub struct OutboxDelivery {
    store: Arc<dyn StateStore>,
    bot: Arc<dyn Bot>,
    batch_size: i64,
    policy: BackoffPolicy,
    retry: Mutex<Option<Retry>>,
}

impl OutboxDelivery {
    pub fn new(store: Arc<dyn StateStore>, bot: Arc<dyn Bot>) -> Self {
        Self {
            store,
            bot,
            batch_size: DEFAULT_BATCH_SIZE,
            policy: BackoffPolicy::default(),
            retry: Mutex::new(None),
        }
    }

    /// Delay sequence between flushes after transient send or store failures.
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// True while an earlier flush left replies queued.
    pub fn is_deferred(&self) -> bool {
        self.lock_retry().is_some()
    }

    /// Sends every pending reply, oldest first.
    ///
    /// After a deferral nothing is sent until the retry time passes: the backoff delay for
    /// transient failures, or Telegram's `retry_after` for rate limits. Only a fatal transport
    /// error (rejected token) is returned.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<DeliveryReport, TransportError> {
        let not_before = self.lock_retry().as_ref().map(|retry| retry.not_before);
        if let Some(not_before) = not_before {
            let now = Instant::now();
            if now < not_before {
                debug!(
                    wait_ms = (not_before - now).as_millis() as u64,
                    "Outbox retry not due yet"
                );
                return Ok(DeliveryReport {
                    deferred: true,
                    ..DeliveryReport::default()
                });
            }
        }

        let (report, retry_after) = self.deliver_pending().await?;
        let mut retry = self.lock_retry();
        if report.deferred {
            let state = retry.get_or_insert_with(|| Retry {
                backoff: self.policy.start(),
                not_before: Instant::now(),
            });
            let backoff_delay = state.backoff.next_delay();
            let delay = retry_after.unwrap_or(backoff_delay);
            state.not_before = Instant::now() + delay;
            info!(
                attempt = state.backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Outbox delivery deferred"
            );
        } else {
            *retry = None;
        }
        Ok(report)
    }

    fn lock_retry(&self) -> std::sync::MutexGuard<'_, Option<Retry>> {
        // Never held across an await; a poisoned lock still holds a usable schedule.
        self.retry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One pass over the outbox. Also returns the server-requested wait when rate limited.
    async fn deliver_pending(&self) -> Result<(DeliveryReport, Option<Duration>), TransportError> {
        let mut report = DeliveryReport::default();
        loop {
            let entries = match self.store.pending_replies(self.batch_size).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Failed to read outbox, deferring delivery");
                    report.deferred = true;
                    return Ok((report, None));
                }
            };
            let full_page = entries.len() as i64 >= self.batch_size;

            for entry in entries {
                match self.bot.send_message(entry.reply.chat_id, &entry.reply.text).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(TransportError::Rejected(reason)) => {
                        warn!(
                            outbox_id = entry.id,
                            chat_id = entry.reply.chat_id,
                            reason = %reason,
                            "Reply rejected permanently, dropping it"
                        );
                        report.dropped += 1;
                    }
                    Err(e) => {
                        warn!(
                            outbox_id = entry.id,
                            chat_id = entry.reply.chat_id,
                            error = %e,
                            "Reply delivery failed, will retry"
                        );
                        report.deferred = true;
                        let retry_after = match e {
                            TransportError::RateLimited { retry_after } => Some(retry_after),
                            _ => None,
                        };
                        return Ok((report, retry_after));
                    }
                }
                if let Err(e) = self.store.mark_delivered(entry.id).await {
                    warn!(outbox_id = entry.id, error = %e, "Failed to remove delivered reply");
                    report.deferred = true;
                    return Ok((report, None));
                }
            }

            if !full_page {
                break;
            }
        }
        if report.delivered + report.dropped > 0 {
            info!(
                delivered = report.delivered,
                dropped = report.dropped,
                "Outbox flushed"
            );
        }
        Ok((report, None))
    }
}
