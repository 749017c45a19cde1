//! Network reachability signal consumed by the sync manager.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Point-in-time connectivity plus an edge-triggered notification on every
/// offline→online transition. Platform shells own the actual detection;
/// the sync manager only consumes this interface.
pub trait NetworkMonitor: Send + Sync {
    /// Current connectivity.
    fn is_online(&self) -> bool;

    /// Receiver notified on each transition to online. Dropping the
    /// receiver unsubscribes.
    fn on_online(&self) -> broadcast::Receiver<()>;
}

/// In-process [`NetworkMonitor`] driven by whoever observes connectivity
/// (a platform shell, or a test).
pub struct NetworkStatus {
    online: AtomicBool,
    tx: broadcast::Sender<()>,
}

impl NetworkStatus {
    /// Create a monitor with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            online: AtomicBool::new(online),
            tx,
        }
    }

    /// Record a connectivity change. An offline→online edge notifies
    /// subscribers; repeated `true` values do not re-fire.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::debug!("Network came online");
            // Send fails only when nobody is subscribed
            let _ = self.tx.send(());
        }
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new(false)
    }
}

impl NetworkMonitor for NetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn on_online(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_edge_triggered_online_events() {
        let status = NetworkStatus::new(false);
        let mut rx = status.on_online();

        status.set_online(true);
        assert!(status.is_online());
        rx.recv().await.unwrap();

        // Staying online does not re-fire
        status.set_online(true);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        // A full offline/online cycle fires again
        status.set_online(false);
        assert!(!status.is_online());
        status.set_online(true);
        rx.recv().await.unwrap();
    }
}
