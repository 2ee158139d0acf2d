//! # CacheSync Core
//!
//! Pure coordination logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The transaction-aware eviction collector
//! - The post-commit batch handler and eviction strategy
//! - Batch coalescing and retry/dead-letter resilience
//! - Port/adapter interfaces (traits) for cache, cluster, and transactions
//!
//! ## Architecture Principles
//! - Only depends on `cachesync-domain`
//! - No cache engine, transport, or platform code
//! - All external dependencies via traits
//! - Pure, testable coordination logic

pub mod eviction;

// Re-export specific items to avoid ambiguity
pub use eviction::batcher::BatchOptimizer;
pub use eviction::collector::TransactionEvictionCollector;
pub use eviction::handler::PostCommitEvictionHandler;
pub use eviction::ports::{
    CacheBackend, ClusterProvider, EvictionBatchSink, EvictionListener, TransactionCompletion,
    TransactionHooks,
};
pub use eviction::registry::{EvictionTarget, EvictionTargetRegistry, RegionRegistry};
pub use eviction::retry::{retry_async, RetryingBroadcaster};
pub use eviction::strategy::EvictionStrategy;
