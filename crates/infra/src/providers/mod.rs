//! Cluster broadcast providers.
//!
//! A provider carries eviction events between nodes. The local provider
//! is a no-op for single-node deployments; the in-process provider runs
//! a real publish/subscribe loop over a shared broadcast bus and is the
//! reference transport for tests and embedded multi-node setups.

pub mod in_process;
pub mod local;
pub mod selection;

pub use in_process::{ClusterBus, InProcessProvider};
pub use local::LocalProvider;
pub use selection::select_provider;
