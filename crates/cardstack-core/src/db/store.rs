//! Generic durable record store over libSQL.
//!
//! Each logical store ("decks", "cards", "sync_queue") is a table holding a
//! JSON snapshot per row plus the columns its secondary indexes need. The
//! [`Record`] trait binds a model to its store and supplies the index values
//! extracted on every `put`.

use crate::error::{Error, Result};
use crate::models::{Card, Deck, SyncQueueEntry};
use libsql::{params_from_iter, Connection, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The named stores the engine persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreName {
    Decks,
    Cards,
    SyncQueue,
}

impl StoreName {
    /// Backing table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Decks => "decks",
            Self::Cards => "cards",
            Self::SyncQueue => "sync_queue",
        }
    }

    /// Secondary index columns, in schema order.
    #[must_use]
    pub const fn index_columns(self) -> &'static [IndexName] {
        match self {
            Self::Decks => &[IndexName::UserId],
            Self::Cards => &[IndexName::DeckId, IndexName::UserId],
            Self::SyncQueue => &[IndexName::EntityType, IndexName::Timestamp],
        }
    }

    /// Whether this store carries the given secondary index.
    #[must_use]
    pub fn has_index(self, index: IndexName) -> bool {
        self.index_columns().contains(&index)
    }
}

/// Secondary indexes across all stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexName {
    UserId,
    DeckId,
    EntityType,
    Timestamp,
}

impl IndexName {
    /// Backing column name.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::DeckId => "deck_id",
            Self::EntityType => "entity_type",
            Self::Timestamp => "timestamp",
        }
    }
}

/// A value stored in (and looked up through) a secondary index column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    Text(String),
    Integer(i64),
}

impl From<IndexValue> for Value {
    fn from(value: IndexValue) -> Self {
        match value {
            IndexValue::Text(text) => Self::Text(text),
            IndexValue::Integer(int) => Self::Integer(int),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// A model persisted in one of the named stores.
pub trait Record: Serialize + DeserializeOwned + Send {
    /// The store this record lives in.
    const STORE: StoreName;

    /// Primary key.
    fn id(&self) -> &str;

    /// Index values, aligned with `STORE.index_columns()`.
    fn index_values(&self) -> Vec<IndexValue>;
}

impl Record for Deck {
    const STORE: StoreName = StoreName::Decks;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![IndexValue::Text(self.user_id.clone())]
    }
}

impl Record for Card {
    const STORE: StoreName = StoreName::Cards;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![
            IndexValue::Text(self.deck_id.clone()),
            IndexValue::Text(self.user_id.clone()),
        ]
    }
}

impl Record for SyncQueueEntry {
    const STORE: StoreName = StoreName::SyncQueue;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![
            IndexValue::Text(self.entity_type.as_str().to_string()),
            IndexValue::Integer(self.timestamp),
        ]
    }
}

/// libSQL implementation of the durable record store.
///
/// Every operation is a single statement, so each is atomic with respect to
/// the table it touches. Absence is `Ok(None)`/empty, never an error.
pub struct RecordStore<'a> {
    conn: &'a Connection,
}

impl<'a> RecordStore<'a> {
    /// Create a new store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Fetch a record by primary key.
    pub async fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?", R::STORE.table());
        let mut rows = self.conn.query(&sql, [id]).await?;

        match rows.next().await? {
            Some(row) => {
                let data: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    /// Fetch every record in the store, in insertion order.
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let sql = format!("SELECT data FROM {} ORDER BY rowid", R::STORE.table());
        let mut rows = self.conn.query(&sql, ()).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let data: String = row.get(0)?;
            records.push(serde_json::from_str(&data)?);
        }
        Ok(records)
    }

    /// Fetch every record whose index column equals `value`, in insertion order.
    pub async fn get_all_by_index<R: Record>(
        &self,
        index: IndexName,
        value: impl Into<IndexValue> + Send,
    ) -> Result<Vec<R>> {
        let store = R::STORE;
        if !store.has_index(index) {
            return Err(Error::InvalidInput(format!(
                "store {} has no index {}",
                store.table(),
                index.column()
            )));
        }

        let sql = format!(
            "SELECT data FROM {} WHERE {} = ? ORDER BY rowid",
            store.table(),
            index.column()
        );
        let mut rows = self
            .conn
            .query(&sql, params_from_iter([Value::from(value.into())]))
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let data: String = row.get(0)?;
            records.push(serde_json::from_str(&data)?);
        }
        Ok(records)
    }

    /// Upsert a record by primary key (idempotent, overwrite-in-place).
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let store = R::STORE;
        let columns = store.index_columns();
        let index_values = record.index_values();

        let mut sql = format!("INSERT OR REPLACE INTO {} (id", store.table());
        for column in columns {
            sql.push_str(", ");
            sql.push_str(column.column());
        }
        sql.push_str(", data) VALUES (?");
        for _ in columns {
            sql.push_str(", ?");
        }
        sql.push_str(", ?)");

        let mut params: Vec<Value> = Vec::with_capacity(index_values.len() + 2);
        params.push(Value::Text(record.id().to_string()));
        params.extend(index_values.into_iter().map(Value::from));
        params.push(Value::Text(serde_json::to_string(record)?));

        self.conn.execute(&sql, params_from_iter(params)).await?;
        Ok(())
    }

    /// Upsert several records.
    pub async fn put_many<R: Record>(&self, records: &[R]) -> Result<()> {
        for record in records {
            self.put(record).await?;
        }
        Ok(())
    }

    /// Delete a record by primary key. Deleting a missing key is not an error.
    pub async fn delete(&self, store: StoreName, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", store.table());
        self.conn.execute(&sql, [id]).await?;
        Ok(())
    }

    /// Delete several records by primary key.
    pub async fn delete_many(&self, store: StoreName, ids: &[String]) -> Result<()> {
        for id in ids {
            self.delete(store, id).await?;
        }
        Ok(())
    }

    /// Remove every record in the store.
    pub async fn clear(&self, store: StoreName) -> Result<()> {
        let sql = format!("DELETE FROM {}", store.table());
        self.conn.execute(&sql, ()).await?;
        Ok(())
    }

    /// Count all records in the store.
    pub async fn count(&self, store: StoreName) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", store.table());
        let mut rows = self.conn.query(&sql, ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Count records whose index column equals `value`.
    pub async fn count_by_index(
        &self,
        store: StoreName,
        index: IndexName,
        value: impl Into<IndexValue> + Send,
    ) -> Result<usize> {
        if !store.has_index(index) {
            return Err(Error::InvalidInput(format!(
                "store {} has no index {}",
                store.table(),
                index.column()
            )));
        }

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            store.table(),
            index.column()
        );
        let mut rows = self
            .conn
            .query(&sql, params_from_iter([Value::from(value.into())]))
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{CardCategory, EntityKind, QueueOperation};
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let deck = Deck::new("u1", "Screenplay", None);
        store.put(&deck).await.unwrap();

        let fetched: Deck = store.get(&deck.id).await.unwrap().unwrap();
        assert_eq!(fetched, deck);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let fetched: Option<Deck> = store.get("nope").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_is_idempotent() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let mut deck = Deck::new("u1", "Draft", None);
        store.put(&deck).await.unwrap();
        deck.title = "Final".to_string();
        store.put(&deck).await.unwrap();
        store.put(&deck).await.unwrap();

        assert_eq!(store.count(StoreName::Decks).await.unwrap(), 1);
        let fetched: Deck = store.get(&deck.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Final");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_all_by_index_filters() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let deck_a = Deck::new("u1", "A", None);
        let deck_b = Deck::new("u1", "B", None);
        for deck in [&deck_a, &deck_b] {
            store.put(deck).await.unwrap();
        }

        let c1 = Card::new("u1", &deck_a.id, "One", CardCategory::Plot, "", None);
        let c2 = Card::new("u1", &deck_a.id, "Two", CardCategory::Theme, "", None);
        let c3 = Card::new("u1", &deck_b.id, "Three", CardCategory::Other, "", None);
        store.put_many(&[c1.clone(), c2.clone(), c3]).await.unwrap();

        let in_a: Vec<Card> = store
            .get_all_by_index(IndexName::DeckId, deck_a.id.as_str())
            .await
            .unwrap();
        assert_eq!(in_a, vec![c1, c2]);

        let count = store
            .count_by_index(StoreName::Cards, IndexName::DeckId, deck_a.id.as_str())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_index_is_invalid_input() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let result: Result<Vec<Deck>> = store.get_all_by_index(IndexName::DeckId, "d1").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = store
            .count_by_index(StoreName::Decks, IndexName::Timestamp, 0_i64)
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_and_clear() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let deck = Deck::new("u1", "Gone soon", None);
        store.put(&deck).await.unwrap();
        store.delete(StoreName::Decks, &deck.id).await.unwrap();
        // Deleting again is not an error
        store.delete(StoreName::Decks, &deck.id).await.unwrap();
        assert_eq!(store.count(StoreName::Decks).await.unwrap(), 0);

        let entries = [
            SyncQueueEntry::new(EntityKind::Deck, "d1", QueueOperation::Create, None),
            SyncQueueEntry::new(EntityKind::Card, "c1", QueueOperation::Delete, None),
            SyncQueueEntry::new(EntityKind::Card, "c2", QueueOperation::Update, None),
        ];
        store.put_many(&entries).await.unwrap();
        assert_eq!(store.count(StoreName::SyncQueue).await.unwrap(), 3);

        let first_two: Vec<String> = entries.iter().take(2).map(|e| e.id.clone()).collect();
        store
            .delete_many(StoreName::SyncQueue, &first_two)
            .await
            .unwrap();
        assert_eq!(store.count(StoreName::SyncQueue).await.unwrap(), 1);

        store.clear(StoreName::SyncQueue).await.unwrap();
        assert_eq!(store.count(StoreName::SyncQueue).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_entries_keep_insertion_order() {
        let db = setup().await;
        let store = RecordStore::new(db.connection().unwrap());

        let mut ids = Vec::new();
        for i in 0..5 {
            let entry = SyncQueueEntry::new(
                EntityKind::Deck,
                format!("d{i}"),
                QueueOperation::Update,
                None,
            );
            ids.push(entry.id.clone());
            store.put(&entry).await.unwrap();
        }

        let entries: Vec<SyncQueueEntry> = store.get_all().await.unwrap();
        let fetched_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        assert_eq!(fetched_ids, ids);

        let deck_entries = store
            .count_by_index(StoreName::SyncQueue, IndexName::EntityType, "deck")
            .await
            .unwrap();
        assert_eq!(deck_entries, 5);
    }
}
