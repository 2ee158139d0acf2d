//! Runtime wiring.
//!
//! [`CacheSyncRuntimeBuilder`] assembles the full eviction pipeline:
//! provider selection, retry layer, batch optimizer, strategy, post-commit
//! handler and transaction collector, then starts the provider's receive
//! path. [`CacheSyncRuntime`] is the embedding application's handle.

use std::sync::Arc;

use cachesync_core::{
    BatchOptimizer, CacheBackend, ClusterProvider, EvictionListener, EvictionTarget,
    EvictionTargetRegistry, PostCommitEvictionHandler, RegionRegistry, RetryingBroadcaster,
    TransactionEvictionCollector, TransactionHooks,
};
use cachesync_domain::{
    CacheMode, CacheSyncConfig, CacheSyncError, PendingEviction, ProviderStats, Result,
};
use tracing::{info, instrument};

use crate::metrics::{EvictionMetrics, PipelineStats};
use crate::providers::select_provider;

/// Builder for a fully wired eviction runtime.
pub struct CacheSyncRuntimeBuilder {
    config: CacheSyncConfig,
    backend: Option<Arc<dyn CacheBackend>>,
    hooks: Option<Arc<dyn TransactionHooks>>,
    targets: Vec<EvictionTarget>,
    candidates: Vec<Arc<dyn ClusterProvider>>,
}

impl CacheSyncRuntimeBuilder {
    pub fn new(config: CacheSyncConfig) -> Self {
        Self { config, backend: None, hooks: None, targets: Vec::new(), candidates: Vec::new() }
    }

    /// The cache the pipeline evicts from.
    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// The transaction engine evictions are scoped to.
    pub fn hooks(mut self, hooks: Arc<dyn TransactionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Register an evictable target type.
    pub fn register_target(mut self, target: EvictionTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Add a candidate cluster provider, probed in registration order.
    pub fn provider_candidate(mut self, provider: Arc<dyn ClusterProvider>) -> Self {
        self.candidates.push(provider);
        self
    }

    /// Wire the pipeline and start the selected provider.
    #[instrument(skip(self), fields(node_id = %self.config.node_id, mode = ?self.config.mode))]
    pub async fn build(self) -> Result<CacheSyncRuntime> {
        let backend = self
            .backend
            .ok_or_else(|| CacheSyncError::Config("No cache backend configured".to_string()))?;
        let hooks = self
            .hooks
            .ok_or_else(|| CacheSyncError::Config("No transaction hooks configured".to_string()))?;

        let registry = Arc::new(EvictionTargetRegistry::new());
        for target in self.targets {
            registry.register(target);
        }
        let regions = Arc::new(RegionRegistry::new());

        let provider = select_provider(&self.config, self.candidates);
        let broadcaster =
            Arc::new(RetryingBroadcaster::new(Arc::clone(&provider), self.config.retry.clone()));
        let outbound = Arc::new(BatchOptimizer::new(
            Arc::clone(&broadcaster),
            self.config.batch.clone(),
        ));

        let strategy = Arc::new(cachesync_core::EvictionStrategy::new(
            self.config.mode,
            provider.kind(),
            self.config.node_id.clone(),
            Arc::clone(&backend),
            Arc::clone(&registry),
            Arc::clone(&regions),
            Arc::clone(&outbound),
            self.config.retry.clone(),
        ));

        let handler = Arc::new(PostCommitEvictionHandler::new(
            Arc::clone(&strategy),
            Arc::clone(&registry),
            Arc::clone(&regions),
        ));
        let collector = Arc::new(TransactionEvictionCollector::new(
            hooks,
            handler,
            Arc::clone(&backend),
        ));

        provider.subscribe(Arc::clone(&strategy) as Arc<dyn EvictionListener>);
        if strategy.mode().is_distributed() {
            provider.initialize().await?;
        }

        info!(
            node_id = %self.config.node_id,
            mode = ?strategy.mode(),
            provider = ?provider.kind(),
            "Eviction runtime started"
        );

        Ok(CacheSyncRuntime {
            config: self.config,
            provider,
            broadcaster,
            strategy,
            collector,
            regions,
            metrics: Arc::new(EvictionMetrics::new()),
        })
    }
}

/// Handle over the running eviction pipeline.
pub struct CacheSyncRuntime {
    config: CacheSyncConfig,
    provider: Arc<dyn ClusterProvider>,
    broadcaster: Arc<RetryingBroadcaster>,
    strategy: Arc<cachesync_core::EvictionStrategy>,
    collector: Arc<TransactionEvictionCollector>,
    regions: Arc<RegionRegistry>,
    metrics: Arc<EvictionMetrics>,
}

/// Point-in-time pipeline counters.
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    pub node_id: String,
    pub mode: CacheMode,
    pub provider: ProviderStats,
    pub pipeline: PipelineStats,
    pub remote_applied: u64,
    pub dead_letters: usize,
    pub active_regions: Vec<String>,
}

impl CacheSyncRuntime {
    /// Collect an eviction intent in the calling thread's transaction
    /// scope, or apply it immediately when no transaction is active.
    pub async fn collect(&self, record: Option<PendingEviction>) -> Result<()> {
        if record.is_some() {
            self.metrics.record_collected();
        }
        self.collector.collect(record).await
    }

    /// Evict bypassing transaction scoping.
    pub async fn evict(&self, type_name: &str, id: Option<&str>) -> Result<()> {
        self.metrics.record_direct_eviction();
        self.strategy.evict(type_name, id).await
    }

    /// Evict every entry of a type.
    pub async fn evict_all(&self, type_name: &str) -> Result<()> {
        self.metrics.record_direct_eviction();
        self.strategy.evict_all(type_name).await
    }

    /// Evict every entry in a named region.
    pub async fn evict_region(&self, region: &str) -> Result<()> {
        self.metrics.record_region_eviction();
        self.strategy.evict_region(region).await
    }

    /// Evict a derived/query-level region.
    pub async fn evict_query_region(&self, region: &str) -> Result<()> {
        self.metrics.record_region_eviction();
        self.strategy.evict_query_region(region).await
    }

    /// Drop every cached entry on this node, query regions included.
    pub async fn clear(&self) -> Result<()> {
        self.metrics.record_direct_eviction();
        self.strategy.clear().await
    }

    /// Whether an entry is currently cached.
    pub async fn contains(&self, type_name: &str, id: &str) -> Result<bool> {
        self.strategy.contains(type_name, id).await
    }

    /// Open a broadcast coalescing window.
    pub fn start_batch(&self) {
        self.strategy.outbound().start_batch();
    }

    /// Close the window and flush queued events as one batch.
    pub async fn end_batch(&self) -> Result<()> {
        self.strategy.outbound().end_batch().await
    }

    /// Retry dead-lettered events once each; returns (recovered, remaining).
    pub async fn reprocess_dead_letters(&self) -> (usize, usize) {
        let (recovered, remaining) = self.broadcaster.reprocess_dead_letters().await;
        self.metrics.record_dead_letters_recovered(recovered as u64);
        (recovered, remaining)
    }

    pub fn strategy(&self) -> &Arc<cachesync_core::EvictionStrategy> {
        &self.strategy
    }

    pub fn collector(&self) -> &Arc<TransactionEvictionCollector> {
        &self.collector
    }

    pub fn config(&self) -> &CacheSyncConfig {
        &self.config
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            node_id: self.config.node_id.clone(),
            mode: self.strategy.mode(),
            provider: self.provider.stats(),
            pipeline: self.metrics.snapshot(),
            remote_applied: self.strategy.remote_applied(),
            dead_letters: self.broadcaster.dead_letter_len(),
            active_regions: self.regions.active_regions(),
        }
    }

    /// Stop the provider's receive path.
    pub async fn shutdown(&self) -> Result<()> {
        self.provider.shutdown().await
    }
}
