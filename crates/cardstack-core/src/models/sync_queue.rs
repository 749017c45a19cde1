//! Durable sync queue entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which entity kind a queue entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Deck,
    Card,
}

impl EntityKind {
    /// String form used in the persisted `entity_type` index column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deck => "deck",
            Self::Card => "card",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutation a queue entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOperation {
    Create,
    Update,
    Delete,
}

/// One not-yet-acknowledged local mutation awaiting upload.
///
/// Entries are FIFO by `timestamp`, removed only after the remote operation
/// durably succeeded, and never mutated in place (at-least-once delivery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    /// Queue entry identifier (UUID)
    pub id: String,
    /// Entity kind this entry refers to
    pub entity_type: EntityKind,
    /// Id of the deck or card
    pub entity_id: String,
    /// Mutation to replay against the remote store
    pub operation: QueueOperation,
    /// Enqueue timestamp (Unix ms, insertion order)
    pub timestamp: i64,
    /// Full entity snapshot at enqueue time; `None` for deletes
    pub data: Option<serde_json::Value>,
}

impl SyncQueueEntry {
    /// Create a new queue entry stamped with the current time.
    #[must_use]
    pub fn new(
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        operation: QueueOperation,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            entity_type,
            entity_id: entity_id.into(),
            operation,
            timestamp: chrono::Utc::now().timestamp_millis(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Deck;

    #[test]
    fn test_entry_snapshot_round_trip() {
        let deck = Deck::new("u1", "Outline", None);
        let snapshot = serde_json::to_value(&deck).unwrap();
        let entry = SyncQueueEntry::new(
            EntityKind::Deck,
            deck.id.clone(),
            QueueOperation::Create,
            Some(snapshot),
        );

        let restored: Deck = serde_json::from_value(entry.data.clone().unwrap()).unwrap();
        assert_eq!(restored, deck);
        assert_eq!(entry.entity_id, deck.id);
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_delete_entry_has_no_snapshot() {
        let entry = SyncQueueEntry::new(EntityKind::Card, "c1", QueueOperation::Delete, None);
        assert!(entry.data.is_none());
        assert_eq!(entry.entity_type.as_str(), "card");
    }

    #[test]
    fn test_serde_uses_lowercase_tags() {
        let entry = SyncQueueEntry::new(EntityKind::Deck, "d1", QueueOperation::Update, None);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"entity_type\":\"deck\""));
        assert!(json.contains("\"operation\":\"update\""));
    }
}
