//! Bounded retry with backoff around provider calls, plus the dead-letter
//! queue for broadcasts that exhaust their attempts.
//!
//! Losing an eviction is a correctness bug, so irrecoverable failures are
//! parked rather than dropped: `reprocess_dead_letters` re-attempts every
//! parked event on demand once the provider recovers. The queue is
//! bounded; on overflow the oldest entry is dropped with a warning
//! (newer invalidations supersede older ones for the same data).

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use cachesync_domain::{CacheSyncError, EvictionEvent, Result, RetrySettings};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::ports::ClusterProvider;

/// Run an async operation with bounded retries and exponential backoff.
///
/// Non-retryable errors (see [`CacheSyncError::is_retryable`]) abort
/// immediately.
pub async fn retry_async<T, F, Fut>(settings: &RetrySettings, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = settings.max_attempts.max(1);
    let mut last_err = CacheSyncError::Internal("retry executed zero attempts".to_string());

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                debug!(attempt = attempt + 1, error = %err, "Attempt failed");
                last_err = err;
                if attempt + 1 < attempts {
                    tokio::time::sleep(settings.backoff_for_attempt(attempt)).await;
                }
            }
        }
    }

    Err(last_err)
}

/// Wraps a cluster provider's broadcast operations with retry and a
/// bounded dead-letter queue.
pub struct RetryingBroadcaster {
    provider: Arc<dyn ClusterProvider>,
    settings: RetrySettings,
    dead_letters: Mutex<VecDeque<EvictionEvent>>,
}

impl RetryingBroadcaster {
    pub fn new(provider: Arc<dyn ClusterProvider>, settings: RetrySettings) -> Self {
        Self { provider, settings, dead_letters: Mutex::new(VecDeque::new()) }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn ClusterProvider> {
        &self.provider
    }

    /// Broadcast one event, retrying on failure. On exhaustion the event
    /// is parked in the dead-letter queue and the final error returned.
    pub async fn broadcast(&self, event: EvictionEvent) -> Result<()> {
        let provider = Arc::clone(&self.provider);
        let attempt = || {
            let provider = Arc::clone(&provider);
            let event = event.clone();
            async move { provider.broadcast(&event).await }
        };
        match retry_async(&self.settings, attempt).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    type_name = %event.type_name,
                    error = %err,
                    "Broadcast exhausted retries, parking event in dead-letter queue"
                );
                self.park(event);
                Err(err)
            }
        }
    }

    /// Broadcast a coalesced batch in one provider call, retrying on
    /// failure. On exhaustion every event in the batch is parked.
    pub async fn broadcast_many(&self, events: Vec<EvictionEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let provider = Arc::clone(&self.provider);
        let events = Arc::new(events);
        let attempt = || {
            let provider = Arc::clone(&provider);
            let events = Arc::clone(&events);
            async move { provider.broadcast_many(&events).await }
        };
        match retry_async(&self.settings, attempt).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(
                    count = events.len(),
                    error = %err,
                    "Batch broadcast exhausted retries, parking events"
                );
                let events =
                    Arc::try_unwrap(events).unwrap_or_else(|shared| shared.as_ref().clone());
                for event in events {
                    self.park(event);
                }
                Err(err)
            }
        }
    }

    /// Re-attempt every dead-lettered event once. Successes leave the
    /// queue; failures remain parked in their original order.
    ///
    /// Returns `(recovered, remaining)`.
    pub async fn reprocess_dead_letters(&self) -> (usize, usize) {
        let parked: Vec<EvictionEvent> = {
            let mut queue = self.dead_letters.lock();
            queue.drain(..).collect()
        };

        if parked.is_empty() {
            return (0, 0);
        }

        let mut recovered = 0;
        let mut still_failed = Vec::new();

        for event in parked {
            match self.provider.broadcast(&event).await {
                Ok(()) => recovered += 1,
                Err(err) => {
                    debug!(type_name = %event.type_name, error = %err, "Reprocess attempt failed");
                    still_failed.push(event);
                }
            }
        }

        let remaining = still_failed.len();
        if remaining > 0 {
            let mut queue = self.dead_letters.lock();
            // Parked events from concurrent broadcasts go behind the
            // re-queued originals to preserve arrival order.
            for event in still_failed.into_iter().rev() {
                queue.push_front(event);
            }
        }

        (recovered, remaining)
    }

    /// Number of events currently parked.
    pub fn dead_letter_len(&self) -> usize {
        self.dead_letters.lock().len()
    }

    fn park(&self, event: EvictionEvent) {
        let mut queue = self.dead_letters.lock();
        if queue.len() >= self.settings.dead_letter_capacity {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    type_name = %dropped.type_name,
                    capacity = self.settings.dead_letter_capacity,
                    "Dead-letter queue full, dropping oldest event"
                );
            }
        }
        queue.push_back(event);
    }
}
