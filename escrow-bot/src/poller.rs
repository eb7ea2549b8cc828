//! Poll with retry: transient failures back off exponentially, rate limits wait the server delay,
//! auth failures end the service. Shutdown interrupts an in-flight poll or a wait.

use escrow_core::{Batch, Cursor, TransportError, UpdateSource};
use tracing::{error, warn};

use crate::backoff::BackoffPolicy;
use crate::lifecycle::{Lifecycle, ServiceState};
use crate::shutdown::Shutdown;

#[derive(Debug)]
pub enum PollOutcome {
    Batch(Batch),
    /// Shutdown fired before a batch arrived.
    Shutdown,
}

/// Polls `source` at `cursor` until a batch arrives, shutdown fires, or a fatal error occurs.
pub async fn poll_with_retry(
    source: &dyn UpdateSource,
    cursor: Cursor,
    policy: &BackoffPolicy,
    lifecycle: &Lifecycle,
    shutdown: &mut Shutdown,
) -> Result<PollOutcome, TransportError> {
    let mut backoff = policy.start();
    loop {
        if shutdown.is_triggered() {
            return Ok(PollOutcome::Shutdown);
        }
        lifecycle.transition(ServiceState::Polling);

        let result = tokio::select! {
            result = source.poll(cursor) => result,
            _ = shutdown.wait() => return Ok(PollOutcome::Shutdown),
        };

        let delay = match result {
            Ok(batch) => return Ok(PollOutcome::Batch(batch)),
            Err(e) if e.is_fatal() => {
                error!(error = %e, cursor = %cursor, "Poll failed with a fatal error");
                return Err(e);
            }
            Err(TransportError::RateLimited { retry_after }) => {
                warn!(retry_after_ms = retry_after.as_millis() as u64, "Poll rate limited");
                retry_after
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    error = %e,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Poll failed, backing off"
                );
                delay
            }
        };

        lifecycle.transition(ServiceState::Backoff);
        if !shutdown.sleep(delay).await {
            return Ok(PollOutcome::Shutdown);
        }
    }
}
