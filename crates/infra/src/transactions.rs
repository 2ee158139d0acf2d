//! In-memory transaction manager.
//!
//! A minimal transaction engine for embedding applications and tests.
//! Transactions are scoped to the thread that began them, mirroring how
//! connection-bound transactions behave; completions registered against
//! a transaction fire exactly once at commit or rollback.
//!
//! Thread scoping means async tests should drive begin/collect/commit
//! from a single task on a current-thread runtime.

use std::sync::Arc;
use std::thread::ThreadId;

use cachesync_core::{TransactionCompletion, TransactionHooks};
use cachesync_domain::TransactionId;
use dashmap::DashMap;
use tracing::{debug, warn};

#[derive(Default)]
pub struct InMemoryTransactionManager {
    active: DashMap<ThreadId, TransactionId>,
    completions: DashMap<TransactionId, Vec<Arc<dyn TransactionCompletion>>>,
}

impl InMemoryTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transaction on the current thread.
    ///
    /// A transaction already active on this thread is implicitly
    /// abandoned; its completions never fire.
    pub fn begin(&self) -> TransactionId {
        let txn = TransactionId::new();
        if let Some(previous) = self.active.insert(std::thread::current().id(), txn) {
            warn!(previous = %previous, "Abandoning still-active transaction on this thread");
            self.completions.remove(&previous);
        }
        debug!(txn = %txn, "Transaction started");
        txn
    }

    /// Commit: clears the active slot, then notifies completions.
    ///
    /// The slot is cleared first so completion callbacks observe no
    /// active transaction, matching post-commit semantics.
    pub async fn commit(&self, txn: TransactionId) {
        self.clear_if_current(txn);
        if let Some((_, observers)) = self.completions.remove(&txn) {
            for observer in observers {
                observer.after_commit(txn).await;
            }
        }
        debug!(txn = %txn, "Transaction committed");
    }

    /// Roll back: clears the active slot, then notifies completions.
    pub async fn rollback(&self, txn: TransactionId) {
        self.clear_if_current(txn);
        if let Some((_, observers)) = self.completions.remove(&txn) {
            for observer in observers {
                observer.after_rollback(txn).await;
            }
        }
        debug!(txn = %txn, "Transaction rolled back");
    }

    fn clear_if_current(&self, txn: TransactionId) {
        let thread = std::thread::current().id();
        if self.active.get(&thread).map(|t| *t == txn).unwrap_or(false) {
            self.active.remove(&thread);
        }
    }
}

impl TransactionHooks for InMemoryTransactionManager {
    fn current_transaction(&self) -> Option<TransactionId> {
        self.active.get(&std::thread::current().id()).map(|t| *t)
    }

    fn register_completion(&self, txn: TransactionId, completion: Arc<dyn TransactionCompletion>) {
        self.completions.entry(txn).or_default().push(completion);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct CountingCompletion {
        commits: AtomicU32,
        rollbacks: AtomicU32,
    }

    #[async_trait]
    impl TransactionCompletion for CountingCompletion {
        async fn after_commit(&self, _txn: TransactionId) {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }

        async fn after_rollback(&self, _txn: TransactionId) {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn commit_fires_completion_once() {
        let manager = InMemoryTransactionManager::new();
        let txn = manager.begin();
        assert_eq!(manager.current_transaction(), Some(txn));

        let completion = Arc::new(CountingCompletion::default());
        manager.register_completion(txn, completion.clone());

        manager.commit(txn).await;

        assert_eq!(completion.commits.load(Ordering::SeqCst), 1);
        assert_eq!(completion.rollbacks.load(Ordering::SeqCst), 0);
        assert_eq!(manager.current_transaction(), None);

        // A second commit of the same id is a no-op.
        manager.commit(txn).await;
        assert_eq!(completion.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rollback_fires_rollback_path() {
        let manager = InMemoryTransactionManager::new();
        let txn = manager.begin();

        let completion = Arc::new(CountingCompletion::default());
        manager.register_completion(txn, completion.clone());

        manager.rollback(txn).await;

        assert_eq!(completion.commits.load(Ordering::SeqCst), 0);
        assert_eq!(completion.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current_transaction(), None);
    }

    #[tokio::test]
    async fn no_active_transaction_outside_begin() {
        let manager = InMemoryTransactionManager::new();
        assert_eq!(manager.current_transaction(), None);
    }

    #[tokio::test]
    async fn beginning_twice_abandons_the_first() {
        let manager = InMemoryTransactionManager::new();
        let first = manager.begin();
        let completion = Arc::new(CountingCompletion::default());
        manager.register_completion(first, completion.clone());

        let second = manager.begin();
        assert_eq!(manager.current_transaction(), Some(second));

        // Committing the abandoned transaction fires nothing.
        manager.commit(first).await;
        assert_eq!(completion.commits.load(Ordering::SeqCst), 0);
        assert_eq!(manager.current_transaction(), Some(second));
    }
}
