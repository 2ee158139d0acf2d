//! Local/distributed eviction coordination.
//!
//! The strategy always evicts locally first; when the resolved mode
//! requires distribution it stamps an event with this node's id and hands
//! it to the outbound path (batch optimizer, then retry layer, then the
//! active provider). Its inbound side implements [`EvictionListener`]:
//! remote events are applied with the same local-eviction logic, after
//! filtering self-origin echoes.
//!
//! Local eviction failures are logged and swallowed: a stale or missing
//! cache entry only costs a cache miss, never correctness, and no
//! eviction-path failure may fail the write that triggered it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cachesync_domain::{
    CacheMode, EvictionEvent, EvictionOperation, PendingEviction, ProviderKind, Result,
    RetrySettings,
};
use tracing::{debug, warn};

use super::batcher::BatchOptimizer;
use super::ports::{CacheBackend, EvictionListener};
use super::registry::{EvictionTargetRegistry, RegionRegistry};
use super::retry::retry_async;

/// Coordination core: decides local vs distributed application of an
/// eviction, broadcasts outward, and applies inbound remote events.
pub struct EvictionStrategy {
    mode: CacheMode,
    node_id: String,
    backend: Arc<dyn CacheBackend>,
    registry: Arc<EvictionTargetRegistry>,
    regions: Arc<RegionRegistry>,
    outbound: Arc<BatchOptimizer>,
    inbound_retry: RetrySettings,
    remote_applied: AtomicU64,
}

impl EvictionStrategy {
    /// Build a strategy with the mode already resolved against the
    /// selected provider. Mode and provider are fixed for the process
    /// lifetime.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        configured_mode: CacheMode,
        provider_kind: ProviderKind,
        node_id: impl Into<String>,
        backend: Arc<dyn CacheBackend>,
        registry: Arc<EvictionTargetRegistry>,
        regions: Arc<RegionRegistry>,
        outbound: Arc<BatchOptimizer>,
        inbound_retry: RetrySettings,
    ) -> Self {
        Self {
            mode: Self::resolve_mode(configured_mode, provider_kind),
            node_id: node_id.into(),
            backend,
            registry,
            regions,
            outbound,
            inbound_retry,
            remote_applied: AtomicU64::new(0),
        }
    }

    /// An explicit configured mode wins; `Auto` infers `Distributed` when
    /// the selected provider is non-local, else `Local`.
    pub fn resolve_mode(configured: CacheMode, provider: ProviderKind) -> CacheMode {
        match configured {
            CacheMode::Auto => {
                if provider.is_distributed() {
                    CacheMode::Distributed
                } else {
                    CacheMode::Local
                }
            }
            explicit => explicit,
        }
    }

    /// The resolved coordination mode.
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// This node's cluster identifier.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Count of remote events applied locally.
    pub fn remote_applied(&self) -> u64 {
        self.remote_applied.load(Ordering::SeqCst)
    }

    /// Evict one entry, or the whole type when `id` is `None`.
    pub async fn evict(&self, type_name: &str, id: Option<&str>) -> Result<()> {
        let record = match id {
            Some(id) => PendingEviction::new(type_name, id, EvictionOperation::Update),
            None => PendingEviction::bulk(type_name, EvictionOperation::BulkUpdate),
        };
        self.evict_record(&record).await
    }

    /// Evict every entry of a type.
    pub async fn evict_all(&self, type_name: &str) -> Result<()> {
        self.evict(type_name, None).await
    }

    /// Apply one eviction record: local first, then broadcast when the
    /// mode requires distribution.
    pub async fn evict_record(&self, record: &PendingEviction) -> Result<()> {
        if self.mode == CacheMode::Disabled {
            return Ok(());
        }

        if let Some(region) = &record.region {
            self.regions.record(region);
        }

        self.apply_local(&record.target_type, record.target_id.as_deref(), record.is_bulk())
            .await;

        if self.mode.is_distributed() {
            let event = EvictionEvent::from_pending(record, &self.node_id);
            if let Err(err) = self.outbound.submit(event).await {
                // Already parked in the dead-letter queue by the retry layer.
                warn!(
                    type_name = %record.target_type,
                    error = %err,
                    "Eviction broadcast failed"
                );
            }
        }

        Ok(())
    }

    /// Evict every entry in a named region.
    pub async fn evict_region(&self, region: &str) -> Result<()> {
        if self.mode == CacheMode::Disabled {
            return Ok(());
        }
        self.regions.record(region);
        self.backend.evict_region(region).await
    }

    /// Evict a derived/query-level region.
    pub async fn evict_query_region(&self, region: &str) -> Result<()> {
        if self.mode == CacheMode::Disabled {
            return Ok(());
        }
        self.regions.record(region);
        self.backend.evict_query_region(region).await
    }

    /// Clear the given query regions, continuing past individual failures.
    pub async fn evict_query_regions(&self, query_regions: &[String]) {
        for region in query_regions {
            if let Err(err) = self.evict_query_region(region).await {
                warn!(region = %region, error = %err, "Query region eviction failed");
            }
        }
    }

    /// Drop every cached entry on this node, query regions included.
    ///
    /// Local-only: a full clear is an administrative action, not a data
    /// mutation, so it is never broadcast.
    pub async fn clear(&self) -> Result<()> {
        if self.mode == CacheMode::Disabled {
            return Ok(());
        }
        self.backend.clear().await
    }

    /// Whether an entry is currently cached.
    pub async fn contains(&self, type_name: &str, id: &str) -> Result<bool> {
        self.backend.contains(type_name, id).await
    }

    /// Access to the outbound batching window (`start_batch`/`end_batch`).
    pub fn outbound(&self) -> &Arc<BatchOptimizer> {
        &self.outbound
    }

    async fn apply_local(&self, type_name: &str, id: Option<&str>, bulk: bool) {
        let result = match id {
            Some(id) if !bulk => self.backend.evict(type_name, id).await,
            _ => self.backend.evict_all(type_name).await,
        };
        if let Err(err) = result {
            warn!(type_name = %type_name, error = %err, "Local eviction failed");
        }
    }
}

#[async_trait]
impl EvictionListener for EvictionStrategy {
    async fn on_event(&self, event: EvictionEvent) {
        if event.origin_node == self.node_id {
            debug!(origin = %event.origin_node, "Ignoring self-origin eviction event");
            return;
        }
        if self.mode == CacheMode::Disabled {
            return;
        }

        let Some(_target) = self.registry.resolve(&event.type_name) else {
            warn!(type_name = %event.type_name, "Received event for unknown eviction target");
            return;
        };

        if let Some(region) = &event.region {
            self.regions.record(region);
        }

        let backend = Arc::clone(&self.backend);
        let type_name = event.type_name.clone();
        let target_id = event.target_id.clone();
        let bulk = event.is_bulk();
        let apply = || {
            let backend = Arc::clone(&backend);
            let type_name = type_name.clone();
            let target_id = target_id.clone();
            async move {
                match target_id.as_deref() {
                    Some(id) if !bulk => backend.evict(&type_name, id).await,
                    _ => backend.evict_all(&type_name).await,
                }
            }
        };

        match retry_async(&self.inbound_retry, apply).await {
            Ok(()) => {
                self.remote_applied.fetch_add(1, Ordering::SeqCst);
                debug!(
                    type_name = %event.type_name,
                    origin = %event.origin_node,
                    "Applied remote eviction event"
                );
            }
            Err(err) => {
                warn!(
                    type_name = %event.type_name,
                    origin = %event.origin_node,
                    error = %err,
                    "Failed to apply remote eviction event"
                );
            }
        }
    }
}
