//! Port interfaces for the eviction pipeline

use std::sync::Arc;

use async_trait::async_trait;
use cachesync_domain::{
    EvictionEvent, PendingEviction, ProviderKind, ProviderStats, Result, TransactionId,
};

/// Capability contract for the underlying cache implementation.
///
/// The pipeline only ever removes entries; population happens on the
/// read path of the embedding application. Implementations must treat a
/// missing entry as success, eviction is idempotent.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Evict a single entry of the given type.
    async fn evict(&self, type_name: &str, id: &str) -> Result<()>;

    /// Evict every entry of the given type.
    async fn evict_all(&self, type_name: &str) -> Result<()>;

    /// Evict every entry in a named region.
    async fn evict_region(&self, region: &str) -> Result<()>;

    /// Evict a derived/query-level region.
    async fn evict_query_region(&self, region: &str) -> Result<()>;

    /// Drop every cached entry, query regions included.
    async fn clear(&self) -> Result<()>;

    /// Whether an entry is currently cached.
    async fn contains(&self, type_name: &str, id: &str) -> Result<bool>;
}

/// Callback invoked once per eviction event received from the cluster.
#[async_trait]
pub trait EvictionListener: Send + Sync {
    /// Handle one inbound remote event.
    async fn on_event(&self, event: EvictionEvent);
}

/// Contract for broadcasting eviction events across a cluster.
///
/// Providers must tolerate transient disconnects by logging and
/// continuing rather than crashing the host process. Delivery is
/// at-least-once; receivers apply events idempotently.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Provider type identifier.
    fn kind(&self) -> ProviderKind;

    /// Current availability/connectivity.
    fn is_available(&self) -> bool;

    /// Start the provider's receive path.
    async fn initialize(&self) -> Result<()>;

    /// Stop the provider and release transport resources.
    async fn shutdown(&self) -> Result<()>;

    /// Broadcast one event to the rest of the cluster.
    async fn broadcast(&self, event: &EvictionEvent) -> Result<()>;

    /// Broadcast a coalesced batch in a single provider call.
    async fn broadcast_many(&self, events: &[EvictionEvent]) -> Result<()>;

    /// Register the single subscribed listener. Replaces any previous one.
    fn subscribe(&self, listener: Arc<dyn EvictionListener>);

    /// Snapshot of counters and connectivity.
    fn stats(&self) -> ProviderStats;
}

/// One-shot observer for the outcome of a transaction.
#[async_trait]
pub trait TransactionCompletion: Send + Sync {
    /// The transaction committed; the write is durably visible.
    async fn after_commit(&self, txn: TransactionId);

    /// The transaction rolled back; buffered work must be discarded.
    async fn after_rollback(&self, txn: TransactionId);
}

/// Interface presented by the external transaction engine.
pub trait TransactionHooks: Send + Sync {
    /// The transaction active on the calling thread, if any.
    fn current_transaction(&self) -> Option<TransactionId>;

    /// Register a one-shot completion observer for a transaction.
    fn register_completion(&self, txn: TransactionId, completion: Arc<dyn TransactionCompletion>);
}

/// Consumer of flushed eviction batches.
///
/// Implemented by the post-commit handler; split out as a port so the
/// collector can be tested against a recording sink.
#[async_trait]
pub trait EvictionBatchSink: Send + Sync {
    /// Apply one completed batch.
    async fn publish(&self, batch: Vec<PendingEviction>) -> Result<()>;
}
