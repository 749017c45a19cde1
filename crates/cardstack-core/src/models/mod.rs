//! Data models for Cardstack

mod card;
mod deck;
mod sync_queue;

pub use card::{Card, CardCategory, CardPatch};
pub use deck::{Deck, DeckPatch};
pub use sync_queue::{EntityKind, QueueOperation, SyncQueueEntry};
