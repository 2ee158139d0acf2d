//! Provider selection.
//!
//! Resolves the configured [`ProviderKind`] against a list of candidate
//! providers. `Auto` probes candidates in the order given and takes the
//! first available distributed one; an explicit kind must match an
//! available candidate. Either way an unavailable choice degrades to the
//! local no-op provider rather than failing startup.

use std::sync::Arc;

use cachesync_core::ClusterProvider;
use cachesync_domain::{CacheSyncConfig, ProviderKind};
use tracing::{info, warn};

use super::local::LocalProvider;

/// Pick the provider to run with.
pub fn select_provider(
    config: &CacheSyncConfig,
    candidates: Vec<Arc<dyn ClusterProvider>>,
) -> Arc<dyn ClusterProvider> {
    match config.provider {
        ProviderKind::Auto => {
            for candidate in &candidates {
                if candidate.kind().is_distributed() && candidate.is_available() {
                    info!(kind = ?candidate.kind(), "Auto-selected cluster provider");
                    return Arc::clone(candidate);
                }
            }
            info!("No distributed provider available, running local-only");
            fallback(config, candidates)
        }
        explicit => {
            for candidate in &candidates {
                if candidate.kind() == explicit && candidate.is_available() {
                    info!(kind = ?explicit, "Using configured cluster provider");
                    return Arc::clone(candidate);
                }
            }
            warn!(
                kind = ?explicit,
                "Configured provider unavailable, falling back to local"
            );
            fallback(config, candidates)
        }
    }
}

fn fallback(
    config: &CacheSyncConfig,
    candidates: Vec<Arc<dyn ClusterProvider>>,
) -> Arc<dyn ClusterProvider> {
    candidates
        .into_iter()
        .find(|c| c.kind() == ProviderKind::Local && c.is_available())
        .unwrap_or_else(|| Arc::new(LocalProvider::new(config.node_id.clone())))
}
