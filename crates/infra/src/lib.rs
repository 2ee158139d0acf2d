//! # CacheSync Infrastructure
//!
//! Infrastructure implementations of core eviction ports.
//!
//! This crate contains:
//! - The moka-backed cache adapter
//! - Cluster providers (local no-op, in-process broadcast bus)
//! - Provider selection and runtime wiring
//! - Configuration loading and the in-memory transaction manager
//! - Pipeline metrics counters
//!
//! ## Architecture
//! - Implements traits defined in `cachesync-core`
//! - Depends on `cachesync-domain` and `cachesync-core`
//! - Contains all "impure" code (transport, cache engine, environment)

pub mod cache;
pub mod config;
pub mod metrics;
pub mod providers;
pub mod runtime;
pub mod transactions;

// Re-export commonly used items
pub use cache::MokaCacheBackend;
pub use metrics::{EvictionMetrics, PipelineStats};
pub use providers::{select_provider, ClusterBus, InProcessProvider, LocalProvider};
pub use runtime::{CacheSyncRuntime, CacheSyncRuntimeBuilder, RuntimeStats};
pub use transactions::InMemoryTransactionManager;
