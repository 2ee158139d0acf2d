//! Coalesces bursts of eviction broadcasts into fewer provider calls.
//!
//! `start_batch` / `end_batch` bound a collection window. Events
//! submitted inside the window are queued and flushed as one
//! `broadcast_many` call at `end_batch`, or earlier when the size
//! threshold is reached. Outside a window events pass straight through
//! to the retrying broadcaster.

use std::sync::Arc;

use cachesync_domain::{BatchSettings, EvictionEvent, Result};
use parking_lot::Mutex;
use tracing::debug;

use super::retry::RetryingBroadcaster;

enum SubmitAction {
    Queued,
    Flush(Vec<EvictionEvent>),
    PassThrough(Box<EvictionEvent>),
}

/// Batches eviction broadcasts within an explicit window.
pub struct BatchOptimizer {
    window: Mutex<Option<Vec<EvictionEvent>>>,
    max_batch_size: usize,
    broadcaster: Arc<RetryingBroadcaster>,
}

impl BatchOptimizer {
    pub fn new(broadcaster: Arc<RetryingBroadcaster>, settings: BatchSettings) -> Self {
        Self {
            window: Mutex::new(None),
            max_batch_size: settings.max_batch_size.max(1),
            broadcaster,
        }
    }

    /// The retry layer this optimizer drains into.
    pub fn broadcaster(&self) -> &Arc<RetryingBroadcaster> {
        &self.broadcaster
    }

    /// Open a collection window. Calling while a window is already open
    /// keeps the existing queue.
    pub fn start_batch(&self) {
        let mut window = self.window.lock();
        if window.is_none() {
            *window = Some(Vec::new());
        } else {
            debug!("Batch window already open");
        }
    }

    /// Close the window and submit queued events as one provider call.
    pub async fn end_batch(&self) -> Result<()> {
        let drained = self.window.lock().take();
        match drained {
            Some(events) if !events.is_empty() => {
                debug!(count = events.len(), "Flushing batched eviction events");
                self.broadcaster.broadcast_many(events).await
            }
            _ => Ok(()),
        }
    }

    /// Whether a collection window is currently open.
    pub fn is_batching(&self) -> bool {
        self.window.lock().is_some()
    }

    /// Submit one event: queued inside an open window (flushing early at
    /// the size threshold), broadcast immediately otherwise.
    pub async fn submit(&self, event: EvictionEvent) -> Result<()> {
        let action = {
            let mut window = self.window.lock();
            match window.as_mut() {
                Some(buffer) => {
                    buffer.push(event);
                    if buffer.len() >= self.max_batch_size {
                        // Early flush keeps the window open for later events.
                        SubmitAction::Flush(std::mem::take(buffer))
                    } else {
                        SubmitAction::Queued
                    }
                }
                None => SubmitAction::PassThrough(Box::new(event)),
            }
        };

        match action {
            SubmitAction::Queued => Ok(()),
            SubmitAction::Flush(events) => {
                debug!(count = events.len(), "Batch threshold reached, flushing early");
                self.broadcaster.broadcast_many(events).await
            }
            SubmitAction::PassThrough(event) => self.broadcaster.broadcast(*event).await,
        }
    }
}
