//! Sync manager: drains the durable queue to the remote store and
//! reconciles remote state back into the local store.
//!
//! Upload first (FIFO, at-least-once, per-entry retry with backoff), then
//! download (last-write-wins keyed on the entity's epoch-millis clock).
//! A single-flight flag guarantees at most one cycle runs at a time.

mod remote;

pub use remote::RemoteStore;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{Card, Deck, EntityKind, QueueOperation, SyncQueueEntry};
use crate::net::NetworkMonitor;
use crate::services::StorageService;

/// Retry tuning for remote operations.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Attempts per remote operation before the entry is left queued
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub base_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// How a `sync_now` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cycle ran (possibly with per-entry failures, see the report error)
    Completed,
    /// Nothing happened: the client is offline
    SkippedOffline,
    /// Nothing happened: another sync was already in flight
    SkippedBusy,
}

/// Aggregate result of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Queue entries uploaded plus remote entities applied locally
    pub items_synced: usize,
    /// Joined per-entry failures, for operator visibility
    pub error: Option<String>,
}

impl SyncReport {
    const fn skipped(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            items_synced: 0,
            error: None,
        }
    }

    /// Whether the cycle ran to completion without any per-entry failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Completed && self.error.is_none()
    }
}

/// Phase transitions observable through [`SyncManager::subscribe`].
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A cycle passed the offline/busy guards and is running
    Started,
    /// A cycle finished; per-entry failures are inside the report
    Completed(SyncReport),
    /// A cycle aborted on a hard local error
    Failed(String),
}

struct Inner {
    storage: StorageService,
    remote: Arc<dyn RemoteStore>,
    network: Arc<dyn NetworkMonitor>,
    user_id: String,
    options: SyncOptions,
    events: broadcast::Sender<SyncEvent>,
    sync_in_progress: AtomicBool,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

/// Resets the single-flight flag when a cycle ends, on any path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates upload and download against the remote store. Cheap to
/// clone; all clones share one single-flight flag and event channel.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    /// Create a manager with default [`SyncOptions`].
    #[must_use]
    pub fn new(
        storage: StorageService,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
        user_id: impl Into<String>,
    ) -> Self {
        Self::with_options(storage, remote, network, user_id, SyncOptions::default())
    }

    /// Create a manager with explicit retry tuning.
    #[must_use]
    pub fn with_options(
        storage: StorageService,
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
        user_id: impl Into<String>,
        options: SyncOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                storage,
                remote,
                network,
                user_id: user_id.into(),
                options,
                events,
                sync_in_progress: AtomicBool::new(false),
                running: AtomicBool::new(false),
                shutdown,
                listener: StdMutex::new(None),
            }),
        }
    }

    /// Subscribe to sync phase transitions. Dropping the receiver
    /// unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the manager is in the `Running` state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Enter `Running`: sync once immediately if already online, then sync
    /// on every offline→online transition until [`stop`](Self::stop).
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.shutdown.send(false);

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            // Subscribe before the initial probe so a transition racing
            // start() is not lost
            let mut online_rx = manager.inner.network.on_online();
            let mut shutdown_rx = manager.inner.shutdown.subscribe();

            if manager.inner.network.is_online() {
                manager.triggered_sync().await;
            }

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    received = online_rx.recv() => match received {
                        Ok(()) => {
                            // stop() may race the reconnect notification
                            if !manager.is_running() {
                                break;
                            }
                            manager.triggered_sync().await;
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("Sync trigger listener stopped");
        });

        if let Ok(mut slot) = self.inner.listener.lock() {
            *slot = Some(handle);
        }
    }

    /// Leave `Running`. Prevents future triggers only; an in-flight cycle
    /// is never aborted.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.shutdown.send(true);
        // Detach the listener; it exits on the shutdown signal without
        // aborting an in-flight cycle
        if let Ok(mut slot) = self.inner.listener.lock() {
            slot.take();
        }
    }

    async fn triggered_sync(&self) {
        match self.sync_now().await {
            Ok(report) => {
                tracing::debug!(
                    outcome = ?report.outcome,
                    items = report.items_synced,
                    "Triggered sync finished"
                );
            }
            Err(error) => tracing::warn!(%error, "Triggered sync failed"),
        }
    }

    /// Run one sync cycle. Returns immediately with a skipped report when
    /// offline or when another cycle is already in flight.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        if !self.inner.network.is_online() {
            tracing::debug!("Sync skipped: offline");
            return Ok(SyncReport::skipped(SyncOutcome::SkippedOffline));
        }
        if self
            .inner
            .sync_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync skipped: already in progress");
            return Ok(SyncReport::skipped(SyncOutcome::SkippedBusy));
        }
        let _guard = FlightGuard(&self.inner.sync_in_progress);

        self.emit(SyncEvent::Started);
        match self.run_cycle().await {
            Ok(report) => {
                self.emit(SyncEvent::Completed(report.clone()));
                Ok(report)
            }
            Err(error) => {
                self.emit(SyncEvent::Failed(error.to_string()));
                Err(error)
            }
        }
    }

    async fn run_cycle(&self) -> Result<SyncReport> {
        let mut items_synced = 0usize;
        let mut errors: Vec<String> = Vec::new();

        // Upload phase: drain the queue FIFO. A failing entry stays queued
        // for the next cycle and never blocks the entries behind it.
        let queue = self.inner.storage.sync_queue().await?;
        tracing::debug!(entries = queue.len(), "Upload phase");
        for entry in queue {
            match self.with_retries(|| self.apply_entry(&entry)).await {
                Ok(()) => {
                    self.inner.storage.remove_sync_queue_entry(&entry.id).await?;
                    if matches!(
                        entry.operation,
                        QueueOperation::Create | QueueOperation::Update
                    ) {
                        match entry.entity_type {
                            EntityKind::Deck => {
                                self.inner.storage.mark_deck_synced(&entry.entity_id).await?;
                            }
                            EntityKind::Card => {
                                self.inner.storage.mark_card_synced(&entry.entity_id).await?;
                            }
                        }
                    }
                    items_synced += 1;
                }
                Err(error @ Error::InvalidInput(_)) => {
                    // A snapshot that cannot be decoded will never succeed;
                    // drop it instead of poisoning the queue forever
                    tracing::warn!(entry_id = %entry.id, %error, "Dropping malformed queue entry");
                    self.inner.storage.remove_sync_queue_entry(&entry.id).await?;
                }
                Err(error) => {
                    tracing::warn!(
                        entry_id = %entry.id,
                        entity_id = %entry.entity_id,
                        %error,
                        "Upload exhausted retries; entry stays queued"
                    );
                    errors.push(format!(
                        "{} {}: {error}",
                        entry.entity_type, entry.entity_id
                    ));
                }
            }
        }

        // Download phase: decks before cards, so parents exist before their
        // children reconcile.
        tracing::debug!("Download phase");
        match self
            .with_retries(|| self.inner.remote.decks_for_user(&self.inner.user_id))
            .await
        {
            Ok(decks) => {
                for deck in decks {
                    if self.inner.storage.apply_remote_deck(deck).await? {
                        items_synced += 1;
                    }
                }
            }
            Err(error) => errors.push(format!("deck download: {error}")),
        }
        match self
            .with_retries(|| self.inner.remote.cards_for_user(&self.inner.user_id))
            .await
        {
            Ok(cards) => {
                for card in cards {
                    if self.inner.storage.apply_remote_card(card).await? {
                        items_synced += 1;
                    }
                }
            }
            Err(error) => errors.push(format!("card download: {error}")),
        }

        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        Ok(SyncReport {
            outcome: SyncOutcome::Completed,
            items_synced,
            error,
        })
    }

    /// Replay one queue entry against the remote store.
    async fn apply_entry(&self, entry: &SyncQueueEntry) -> Result<()> {
        let user_id = &self.inner.user_id;
        match (entry.entity_type, entry.operation) {
            (EntityKind::Deck, QueueOperation::Create | QueueOperation::Update) => {
                let deck: Deck = Self::snapshot(entry)?;
                self.inner.remote.upsert_deck(user_id, &deck).await
            }
            (EntityKind::Card, QueueOperation::Create | QueueOperation::Update) => {
                let card: Card = Self::snapshot(entry)?;
                self.inner.remote.upsert_card(user_id, &card).await
            }
            (EntityKind::Deck, QueueOperation::Delete) => {
                self.inner.remote.delete_deck(user_id, &entry.entity_id).await
            }
            (EntityKind::Card, QueueOperation::Delete) => {
                self.inner.remote.delete_card(user_id, &entry.entity_id).await
            }
        }
    }

    fn snapshot<T: DeserializeOwned>(entry: &SyncQueueEntry) -> Result<T> {
        let data = entry.data.clone().ok_or_else(|| {
            Error::InvalidInput(format!("queue entry {} has no snapshot", entry.id))
        })?;
        serde_json::from_value(data)
            .map_err(|e| Error::InvalidInput(format!("queue entry {}: {e}", entry.id)))
    }

    /// Run a remote operation with exponential backoff: base delay doubled
    /// per attempt, up to `max_attempts`. Malformed input is not retried.
    async fn with_retries<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.inner.options.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error @ Error::InvalidInput(_)) => return Err(error),
                Err(error) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(error);
                    }
                    let delay = self.inner.options.base_delay * 2_u32.pow(attempt - 1);
                    tracing::debug!(attempt, ?delay, %error, "Retrying remote operation");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // Send fails only when nobody is subscribed
        let _ = self.inner.events.send(event);
    }
}
