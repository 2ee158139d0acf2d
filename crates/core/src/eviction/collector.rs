//! Transaction-aware eviction collector.
//!
//! Buffers eviction intents against the active transaction and forwards
//! them only after that transaction commits. Each transaction has its own
//! isolated queue; rollback simply abandons the queue. Outside a
//! transaction every record is published immediately as a single-record
//! batch.
//!
//! The commit-triggered flush runs synchronously on the committing path,
//! before the transaction boundary is considered closed, so eviction can
//! never race ahead of the write it invalidates.

use std::sync::Arc;

use async_trait::async_trait;
use cachesync_domain::{PendingEviction, Result, TransactionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error, warn};

use super::ports::{CacheBackend, EvictionBatchSink, TransactionCompletion, TransactionHooks};

/// Number of publish attempts before falling back to direct eviction.
const PUBLISH_ATTEMPTS: usize = 2;

/// Accumulates eviction records per active transaction.
pub struct TransactionEvictionCollector {
    queues: DashMap<TransactionId, Vec<PendingEviction>>,
    hooks: Arc<dyn TransactionHooks>,
    sink: Arc<dyn EvictionBatchSink>,
    fallback: Arc<dyn CacheBackend>,
}

impl TransactionEvictionCollector {
    pub fn new(
        hooks: Arc<dyn TransactionHooks>,
        sink: Arc<dyn EvictionBatchSink>,
        fallback: Arc<dyn CacheBackend>,
    ) -> Self {
        Self { queues: DashMap::new(), hooks, sink, fallback }
    }

    /// Collect one eviction intent.
    ///
    /// `None` is a strict no-op. With an active transaction the record is
    /// appended to that transaction's private queue; the first append
    /// registers a one-shot completion observer. Without a transaction the
    /// record is published immediately as a single-record batch.
    pub async fn collect(self: &Arc<Self>, record: Option<PendingEviction>) -> Result<()> {
        let Some(record) = record else {
            return Ok(());
        };

        match self.hooks.current_transaction() {
            None => {
                self.deliver_with_fallback(vec![record]).await;
                Ok(())
            }
            Some(txn) => {
                let is_first = match self.queues.entry(txn) {
                    Entry::Occupied(mut occupied) => {
                        occupied.get_mut().push(record);
                        false
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(vec![record]);
                        true
                    }
                };
                if is_first {
                    self.hooks.register_completion(
                        txn,
                        Arc::clone(self) as Arc<dyn TransactionCompletion>,
                    );
                }
                Ok(())
            }
        }
    }

    /// Queue size for the current transaction, zero when none is active.
    pub fn pending_count(&self) -> usize {
        self.hooks
            .current_transaction()
            .and_then(|txn| self.queues.get(&txn).map(|queue| queue.len()))
            .unwrap_or(0)
    }

    /// Whether the current transaction has buffered evictions.
    pub fn has_pending(&self) -> bool {
        self.pending_count() > 0
    }

    /// Publish a batch to the sink, retrying once, then falling back to
    /// direct per-record eviction. Losing an eviction is a correctness
    /// bug; performing an extra one is always safe.
    async fn deliver_with_fallback(&self, batch: Vec<PendingEviction>) {
        for attempt in 1..=PUBLISH_ATTEMPTS {
            match self.sink.publish(batch.clone()).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(attempt, error = %err, "Failed to publish eviction batch");
                }
            }
        }

        error!(
            count = batch.len(),
            "Publishing failed repeatedly, executing direct fallback evictions"
        );
        for record in batch {
            let result = match record.target_id.as_deref() {
                Some(id) if !record.is_bulk() => {
                    self.fallback.evict(&record.target_type, id).await
                }
                _ => self.fallback.evict_all(&record.target_type).await,
            };
            if let Err(err) = result {
                error!(
                    type_name = %record.target_type,
                    error = %err,
                    "Direct fallback eviction failed"
                );
            }
        }
    }
}

#[async_trait]
impl TransactionCompletion for TransactionEvictionCollector {
    async fn after_commit(&self, txn: TransactionId) {
        let Some((_, batch)) = self.queues.remove(&txn) else {
            return;
        };
        if batch.is_empty() {
            return;
        }
        debug!(%txn, count = batch.len(), "Flushing eviction batch after commit");
        self.deliver_with_fallback(batch).await;
    }

    async fn after_rollback(&self, txn: TransactionId) {
        if self.queues.remove(&txn).is_some() {
            debug!(%txn, "Discarded eviction queue after rollback");
        }
    }
}
