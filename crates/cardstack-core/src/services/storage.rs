//! Local-first storage service for decks and cards.
//!
//! Every mutation succeeds locally regardless of connectivity: the entity is
//! written with `synced = false` / `pending_changes = true` and a snapshot is
//! appended to the durable sync queue. The sync manager later drains the
//! queue and calls back into this service to apply remote state; it never
//! writes rows itself.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, IndexName, RecordStore, StoreName};
use crate::error::{Error, Result};
use crate::models::{
    Card, CardCategory, CardPatch, Deck, DeckPatch, EntityKind, QueueOperation, SyncQueueEntry,
};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Thread-safe service owning the local database.
#[derive(Clone)]
pub struct StorageService {
    db: Arc<Mutex<Database>>,
}

impl StorageService {
    /// Open the service over a database file at the given path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Close the underlying database. Later operations fail with
    /// [`Error::NotOpen`] until a new service is opened.
    pub async fn close(&self) {
        let mut db = self.db.lock().await;
        db.close();
    }

    // ----- decks -----

    /// Fetch a deck by id.
    pub async fn get_deck(&self, id: &str) -> Result<Option<Deck>> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.get(id).await
    }

    /// List all decks owned by a user, in creation order.
    pub async fn decks_for_user(&self, user_id: &str) -> Result<Vec<Deck>> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.get_all_by_index(IndexName::UserId, user_id).await
    }

    /// Create a deck and queue its upload.
    pub async fn create_deck(
        &self,
        user_id: &str,
        title: &str,
        id: Option<String>,
    ) -> Result<Deck> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let deck = Deck::new(user_id, title, id);
        store.put(&deck).await?;
        Self::enqueue(
            &store,
            EntityKind::Deck,
            &deck.id,
            QueueOperation::Create,
            Some(serde_json::to_value(&deck)?),
        )
        .await?;

        tracing::debug!(deck_id = %deck.id, "Created deck locally");
        Ok(deck)
    }

    /// Merge changed fields into a deck, bump its clock, and queue the update.
    pub async fn update_deck(&self, id: &str, patch: DeckPatch) -> Result<Deck> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let mut deck: Deck = store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if let Some(title) = patch.title {
            deck.title = title;
        }
        deck.last_updated = now_millis();
        deck.synced = false;
        deck.pending_changes = true;

        store.put(&deck).await?;
        Self::enqueue(
            &store,
            EntityKind::Deck,
            &deck.id,
            QueueOperation::Update,
            Some(serde_json::to_value(&deck)?),
        )
        .await?;

        Ok(deck)
    }

    /// Delete a deck and all its cards. Children go first so the local store
    /// never holds an orphaned card; each cascaded card delete queues its own
    /// remote delete.
    pub async fn delete_deck(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let deck: Deck = store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let cards: Vec<Card> = store.get_all_by_index(IndexName::DeckId, id).await?;
        for card in &cards {
            store.delete(StoreName::Cards, &card.id).await?;
            Self::enqueue(
                &store,
                EntityKind::Card,
                &card.id,
                QueueOperation::Delete,
                None,
            )
            .await?;
        }

        store.delete(StoreName::Decks, &deck.id).await?;
        Self::enqueue(
            &store,
            EntityKind::Deck,
            &deck.id,
            QueueOperation::Delete,
            None,
        )
        .await?;

        tracing::debug!(deck_id = %deck.id, cards = cards.len(), "Deleted deck and children");
        Ok(())
    }

    // ----- cards -----

    /// Fetch a card by id.
    pub async fn get_card(&self, id: &str) -> Result<Option<Card>> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.get(id).await
    }

    /// List the cards of a deck, in creation order.
    pub async fn cards_for_deck(&self, deck_id: &str) -> Result<Vec<Card>> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.get_all_by_index(IndexName::DeckId, deck_id).await
    }

    /// List all cards owned by a user.
    pub async fn cards_for_user(&self, user_id: &str) -> Result<Vec<Card>> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.get_all_by_index(IndexName::UserId, user_id).await
    }

    /// Create a card in an existing deck and queue its upload. Fails with
    /// [`Error::NotFound`] when the parent deck is missing.
    pub async fn create_card(
        &self,
        user_id: &str,
        deck_id: &str,
        title: &str,
        category: CardCategory,
        content: &str,
        id: Option<String>,
    ) -> Result<Card> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let _parent: Deck = store
            .get(deck_id)
            .await?
            .ok_or_else(|| Error::NotFound(deck_id.to_string()))?;

        let card = Card::new(user_id, deck_id, title, category, content, id);
        store.put(&card).await?;
        Self::enqueue(
            &store,
            EntityKind::Card,
            &card.id,
            QueueOperation::Create,
            Some(serde_json::to_value(&card)?),
        )
        .await?;
        Self::refresh_deck_card_count(&store, deck_id).await?;

        tracing::debug!(card_id = %card.id, deck_id, "Created card locally");
        Ok(card)
    }

    /// Merge changed fields into a card, bump its clock, and queue the update.
    pub async fn update_card(&self, id: &str, patch: CardPatch) -> Result<Card> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let mut card: Card = store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if let Some(title) = patch.title {
            card.title = title;
        }
        if let Some(category) = patch.category {
            card.category = category;
        }
        if let Some(content) = patch.content {
            card.content = content;
        }
        card.updated_at = now_millis();
        card.synced = false;
        card.pending_changes = true;

        store.put(&card).await?;
        Self::enqueue(
            &store,
            EntityKind::Card,
            &card.id,
            QueueOperation::Update,
            Some(serde_json::to_value(&card)?),
        )
        .await?;

        Ok(card)
    }

    /// Delete a card, queue the remote delete, and refresh the parent count.
    pub async fn delete_card(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let card: Card = store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        store.delete(StoreName::Cards, &card.id).await?;
        Self::enqueue(
            &store,
            EntityKind::Card,
            &card.id,
            QueueOperation::Delete,
            None,
        )
        .await?;
        Self::refresh_deck_card_count(&store, &card.deck_id).await?;

        Ok(())
    }

    // ----- sync queue -----

    /// The pending queue, ascending by enqueue timestamp.
    pub async fn sync_queue(&self) -> Result<Vec<SyncQueueEntry>> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let mut entries: Vec<SyncQueueEntry> = store.get_all().await?;
        // Stable sort keeps insertion order for same-millisecond entries
        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }

    /// Remove one queue entry after its remote operation succeeded.
    pub async fn remove_sync_queue_entry(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.delete(StoreName::SyncQueue, id).await
    }

    /// Drop every queued entry.
    pub async fn clear_sync_queue(&self) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.clear(StoreName::SyncQueue).await
    }

    /// Number of queued, not-yet-uploaded mutations.
    pub async fn pending_sync_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.count(StoreName::SyncQueue).await
    }

    // ----- sync-side appliers -----

    /// Mark a deck as acknowledged by the remote store. No-op when the deck
    /// has been deleted locally in the meantime.
    pub async fn mark_deck_synced(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        if let Some(mut deck) = store.get::<Deck>(id).await? {
            deck.synced = true;
            deck.pending_changes = false;
            store.put(&deck).await?;
        }
        Ok(())
    }

    /// Mark a card as acknowledged by the remote store. No-op when the card
    /// has been deleted locally in the meantime.
    pub async fn mark_card_synced(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        if let Some(mut card) = store.get::<Card>(id).await? {
            card.synced = true;
            card.pending_changes = false;
            store.put(&card).await?;
        }
        Ok(())
    }

    /// Reconcile a remote deck into the local store using last-write-wins on
    /// `last_updated`. Ties keep the local version so a same-timestamp remote
    /// echo never discards a local mutation. Returns whether the remote
    /// version was applied.
    ///
    /// The clock is wall-derived epoch millis; with skew across devices a
    /// genuinely newer edit can lose. Known limitation, not corrected here.
    pub async fn apply_remote_deck(&self, remote: Deck) -> Result<bool> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let local: Option<Deck> = store.get(&remote.id).await?;
        if let Some(local) = local {
            if remote.last_updated <= local.last_updated {
                tracing::debug!(deck_id = %remote.id, "Kept local deck (remote not newer)");
                return Ok(false);
            }
        }

        let mut deck = remote;
        deck.synced = true;
        deck.pending_changes = false;
        store.put(&deck).await?;
        // The remote card_count is never trusted
        Self::refresh_deck_card_count(&store, &deck.id).await?;
        Ok(true)
    }

    /// Reconcile a remote card into the local store using last-write-wins on
    /// `updated_at`; same tie-break and clock caveat as decks. Applying a
    /// card refreshes the parent deck's count.
    pub async fn apply_remote_card(&self, remote: Card) -> Result<bool> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);

        let local: Option<Card> = store.get(&remote.id).await?;
        if let Some(local) = local {
            if remote.updated_at <= local.updated_at {
                tracing::debug!(card_id = %remote.id, "Kept local card (remote not newer)");
                return Ok(false);
            }
        }

        let mut card = remote;
        card.synced = true;
        card.pending_changes = false;
        let deck_id = card.deck_id.clone();
        store.put(&card).await?;
        Self::refresh_deck_card_count(&store, &deck_id).await?;
        Ok(true)
    }

    /// Test hook: append an arbitrary queue entry.
    #[cfg(test)]
    pub(crate) async fn enqueue_raw(&self, entry: &SyncQueueEntry) -> Result<()> {
        let db = self.db.lock().await;
        let store = RecordStore::new(db.connection()?);
        store.put(entry).await
    }

    // ----- internals -----

    async fn enqueue(
        store: &RecordStore<'_>,
        entity_type: EntityKind,
        entity_id: &str,
        operation: QueueOperation,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let entry = SyncQueueEntry::new(entity_type, entity_id, operation, data);
        store.put(&entry).await
    }

    /// Recompute a deck's derived `card_count` from its local card rows.
    /// Writes without enqueuing and without bumping `last_updated`: a pure
    /// count refresh is local-only and must never win an LWW comparison.
    async fn refresh_deck_card_count(store: &RecordStore<'_>, deck_id: &str) -> Result<()> {
        let Some(mut deck) = store.get::<Deck>(deck_id).await? else {
            return Ok(());
        };

        let count = store
            .count_by_index(StoreName::Cards, IndexName::DeckId, deck_id)
            .await?;
        if deck.card_count != count {
            deck.card_count = count;
            store.put(&deck).await?;
        }
        Ok(())
    }
}
