//! Database layer for Cardstack

mod connection;
mod migrations;
mod store;

pub use connection::Database;
pub use store::{IndexName, IndexValue, Record, RecordStore, StoreName};
