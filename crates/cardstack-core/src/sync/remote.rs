//! Remote store collaborator contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Card, Deck};

/// The authoritative backend, reached only by the sync manager.
///
/// All operations are idempotent: `upsert_*` is create-or-replace by id and
/// deleting an already-deleted id is not an error. Fetches must return every
/// entity the user owns, each carrying a last-modified timestamp comparable
/// to the local `last_updated`/`updated_at` clocks.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All remote decks owned by the user.
    async fn decks_for_user(&self, user_id: &str) -> Result<Vec<Deck>>;

    /// All remote cards owned by the user.
    async fn cards_for_user(&self, user_id: &str) -> Result<Vec<Card>>;

    /// Create-or-replace a deck.
    async fn upsert_deck(&self, user_id: &str, deck: &Deck) -> Result<()>;

    /// Create-or-replace a card.
    async fn upsert_card(&self, user_id: &str, card: &Card) -> Result<()>;

    /// Delete a deck by id.
    async fn delete_deck(&self, user_id: &str, deck_id: &str) -> Result<()>;

    /// Delete a card by id.
    async fn delete_card(&self, user_id: &str, card_id: &str) -> Result<()>;
}
