//! In-process broadcast provider.
//!
//! Carries eviction events over a shared [`ClusterBus`] backed by a
//! tokio broadcast channel. Every node attached to the same bus receives
//! every event, including its own; origin filtering happens in the
//! subscribed listener, not in the transport.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cachesync_core::{ClusterProvider, EvictionListener};
use cachesync_domain::{CacheSyncError, EvictionEvent, ProviderKind, ProviderStats, Result};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const BUS_CAPACITY: usize = 1024;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared in-process event bus. Clone handles to attach more nodes.
#[derive(Clone)]
pub struct ClusterBus {
    sender: broadcast::Sender<EvictionEvent>,
}

impl ClusterBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    fn subscribe(&self) -> broadcast::Receiver<EvictionEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: EvictionEvent) -> Result<()> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| CacheSyncError::Broadcast("no receivers attached to bus".to_string()))
    }

    #[cfg(test)]
    fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ClusterBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider joining one node to a [`ClusterBus`].
pub struct InProcessProvider {
    node_id: String,
    bus: ClusterBus,
    listener: RwLock<Option<Arc<dyn EvictionListener>>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    cancellation: CancellationToken,
    connected: Arc<AtomicBool>,
    evictions_sent: AtomicU64,
    evictions_received: Arc<AtomicU64>,
}

impl InProcessProvider {
    pub fn new(node_id: impl Into<String>, bus: ClusterBus) -> Self {
        Self {
            node_id: node_id.into(),
            bus,
            listener: RwLock::new(None),
            receive_task: Mutex::new(None),
            cancellation: CancellationToken::new(),
            connected: Arc::new(AtomicBool::new(false)),
            evictions_sent: AtomicU64::new(0),
            evictions_received: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn receive_loop(
        node_id: String,
        mut rx: broadcast::Receiver<EvictionEvent>,
        listener: Arc<dyn EvictionListener>,
        received: Arc<AtomicU64>,
        connected: Arc<AtomicBool>,
        cancellation: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!(node_id = %node_id, "Receive loop stopping");
                    break;
                }
                next = rx.recv() => match next {
                    Ok(event) => {
                        if event.origin_node != node_id {
                            received.fetch_add(1, Ordering::Relaxed);
                        }
                        // Self-origin events are delivered too; the
                        // listener owns the echo filter.
                        listener.on_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(node_id = %node_id, missed, "Receiver lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(node_id = %node_id, "Bus closed, disconnecting");
                        connected.store(false, Ordering::Relaxed);
                        break;
                    }
                },
            }
        }
    }
}

impl Drop for InProcessProvider {
    fn drop(&mut self) {
        // Receive task still present means shutdown was never called.
        if let Some(handle) = self.receive_task.lock().take() {
            warn!(
                node_id = %self.node_id,
                "Provider dropped while running, aborting receive task"
            );
            self.cancellation.cancel();
            handle.abort();
        }
    }
}

#[async_trait]
impl ClusterProvider for InProcessProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::InProcess
    }

    fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(node_id = %self.node_id))]
    async fn initialize(&self) -> Result<()> {
        let listener = self
            .listener
            .read()
            .clone()
            .ok_or_else(|| CacheSyncError::Provider("no listener subscribed".to_string()))?;

        let rx = self.bus.subscribe();
        self.connected.store(true, Ordering::Relaxed);

        let handle = tokio::spawn(Self::receive_loop(
            self.node_id.clone(),
            rx,
            listener,
            Arc::clone(&self.evictions_received),
            Arc::clone(&self.connected),
            self.cancellation.clone(),
        ));

        let mut slot = self.receive_task.lock();
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
            warn!(node_id = %self.node_id, "Replaced an existing receive task");
        }

        info!(node_id = %self.node_id, "In-process provider initialized");
        Ok(())
    }

    #[instrument(skip(self), fields(node_id = %self.node_id))]
    async fn shutdown(&self) -> Result<()> {
        self.cancellation.cancel();
        self.connected.store(false, Ordering::Relaxed);

        let handle = self.receive_task.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                warn!(node_id = %self.node_id, "Receive task did not stop in time");
            }
        }
        debug!(node_id = %self.node_id, "In-process provider shut down");
        Ok(())
    }

    async fn broadcast(&self, event: &EvictionEvent) -> Result<()> {
        self.bus.publish(event.clone())?;
        self.evictions_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn broadcast_many(&self, events: &[EvictionEvent]) -> Result<()> {
        for event in events {
            self.bus.publish(event.clone())?;
            self.evictions_sent.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn EvictionListener>) {
        self.listener.write().replace(listener);
    }

    fn stats(&self) -> ProviderStats {
        ProviderStats {
            node_id: self.node_id.clone(),
            connected: self.connected.load(Ordering::Relaxed),
            evictions_sent: self.evictions_sent.load(Ordering::Relaxed),
            evictions_received: self.evictions_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use cachesync_domain::EvictionOperation;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    #[derive(Default)]
    struct RecordingListener {
        events: TokioMutex<Vec<EvictionEvent>>,
    }

    #[async_trait]
    impl EvictionListener for RecordingListener {
        async fn on_event(&self, event: EvictionEvent) {
            self.events.lock().await.push(event);
        }
    }

    fn event(origin: &str, id: &str) -> EvictionEvent {
        EvictionEvent {
            type_name: "Order".to_string(),
            target_id: Some(id.to_string()),
            region: None,
            operation: EvictionOperation::Update,
            origin_node: origin.to_string(),
            timestamp: 0,
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn events_cross_the_bus_between_nodes() {
        let bus = ClusterBus::new();
        let a = InProcessProvider::new("node-a", bus.clone());
        let b = InProcessProvider::new("node-b", bus);

        let heard_by_b = Arc::new(RecordingListener::default());
        a.subscribe(Arc::new(RecordingListener::default()));
        b.subscribe(heard_by_b.clone());
        a.initialize().await.unwrap();
        b.initialize().await.unwrap();

        a.broadcast(&event("node-a", "42")).await.unwrap();

        wait_for(|| b.stats().evictions_received == 1).await;
        let events = heard_by_b.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin_node, "node-a");

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn own_events_are_delivered_but_not_counted_as_received() {
        let bus = ClusterBus::new();
        let a = InProcessProvider::new("node-a", bus);

        let heard = Arc::new(RecordingListener::default());
        a.subscribe(heard.clone());
        a.initialize().await.unwrap();

        a.broadcast(&event("node-a", "42")).await.unwrap();

        wait_for(|| a.stats().evictions_sent == 1).await;
        // The echo reaches the listener; filtering is the listener's job.
        wait_for(|| {
            heard.events.try_lock().map(|e| e.len() == 1).unwrap_or(false)
        })
        .await;
        assert_eq!(a.stats().evictions_received, 0);

        a.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_running_provider_stops_its_receive_task() {
        let bus = ClusterBus::new();
        let a = InProcessProvider::new("node-a", bus.clone());
        a.subscribe(Arc::new(RecordingListener::default()));
        a.initialize().await.unwrap();
        assert_eq!(bus.receiver_count(), 1);

        drop(a);

        wait_for(|| bus.receiver_count() == 0).await;
    }

    #[tokio::test]
    async fn initialize_without_listener_fails() {
        let bus = ClusterBus::new();
        let a = InProcessProvider::new("node-a", bus);
        assert!(a.initialize().await.is_err());
    }

    #[tokio::test]
    async fn broadcast_many_sends_each_event() {
        let bus = ClusterBus::new();
        let a = InProcessProvider::new("node-a", bus.clone());
        let b = InProcessProvider::new("node-b", bus);

        a.subscribe(Arc::new(RecordingListener::default()));
        b.subscribe(Arc::new(RecordingListener::default()));
        a.initialize().await.unwrap();
        b.initialize().await.unwrap();

        a.broadcast_many(&[event("node-a", "1"), event("node-a", "2"), event("node-a", "3")])
            .await
            .unwrap();

        wait_for(|| b.stats().evictions_received == 3).await;
        assert_eq!(a.stats().evictions_sent, 3);

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }
}
