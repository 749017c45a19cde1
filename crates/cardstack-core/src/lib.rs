//! cardstack-core - Core library for Cardstack
//!
//! Local-first storage and synchronization engine for decks of note cards.
//! Every mutation succeeds against the local store and is queued in a
//! durable sync queue; the sync manager drains the queue to the remote
//! store and reconciles remote state back with last-write-wins. UI shells
//! consume the CRUD API and the sync event channel.

pub mod db;
pub mod error;
pub mod models;
pub mod net;
pub mod services;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Card, CardCategory, CardPatch, Deck, DeckPatch};
pub use services::StorageService;
pub use sync::{RemoteStore, SyncEvent, SyncManager, SyncOptions, SyncOutcome, SyncReport};
