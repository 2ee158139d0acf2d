//! Transaction-aware eviction pipeline.
//!
//! Records flow through the pipeline in four stages: an external trigger
//! hands a [`cachesync_domain::PendingEviction`] to the
//! [`collector::TransactionEvictionCollector`], which buffers it against
//! the active transaction; on commit the buffered records are flushed as
//! one batch to the [`handler::PostCommitEvictionHandler`]; the handler
//! drives each record through the [`strategy::EvictionStrategy`], which
//! evicts locally and, when distribution is enabled, broadcasts through
//! the active cluster provider. The [`batcher::BatchOptimizer`] and
//! [`retry::RetryingBroadcaster`] wrap the strategy-provider interaction
//! for throughput and resilience.

pub mod batcher;
pub mod collector;
pub mod handler;
pub mod ports;
pub mod registry;
pub mod retry;
pub mod strategy;
