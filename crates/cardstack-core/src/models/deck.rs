//! Deck model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deck of note cards owned by a single user.
///
/// `card_count` is a derived cache of the number of child cards. It is
/// recomputed from the local card rows after every card create/delete and is
/// never trusted from any other source, including the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Unique identifier (opaque string, UUID when generated locally)
    pub id: String,
    /// Deck title
    pub title: String,
    /// Cached number of cards in this deck (derived, local-only)
    pub card_count: usize,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms) - the LWW clock
    pub last_updated: i64,
    /// Whether the last local mutation has been acknowledged remotely
    pub synced: bool,
    /// Whether local mutations are still queued for upload
    pub pending_changes: bool,
}

impl Deck {
    /// Create a new unsynced deck. When `id` is `None` a UUID v7 is
    /// generated, so the id stays stable across the remote round-trip.
    #[must_use]
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, id: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            title: title.into(),
            card_count: 0,
            user_id: user_id.into(),
            created_at: now,
            last_updated: now,
            synced: false,
            pending_changes: true,
        }
    }
}

/// Partial update for [`Deck`] fields a caller may change.
#[derive(Debug, Clone, Default)]
pub struct DeckPatch {
    /// New title, if changing
    pub title: Option<String>,
}

impl DeckPatch {
    /// Patch only the title.
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}
