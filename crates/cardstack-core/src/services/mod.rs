//! Domain services built on the database layer

mod storage;

pub use storage::StorageService;
