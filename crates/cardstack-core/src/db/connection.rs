//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

struct Inner {
    _db: LibSqlDatabase,
    conn: Connection,
}

/// Database wrapper for libSQL connections.
///
/// `open`/`close` form a paired lifecycle: after `close()` every data
/// operation fails with [`Error::NotOpen`] until a fresh handle is opened.
/// There is deliberately no global connection; the handle is owned by
/// whichever service opened it.
pub struct Database {
    inner: Option<Inner>,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            inner: Some(Inner { _db: db, conn }),
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            inner: Some(Inner { _db: db, conn }),
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Close the database. Idempotent; subsequent data operations fail
    /// with [`Error::NotOpen`].
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("Database closed");
        }
    }

    /// Whether the handle is currently open.
    pub const fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> Result<&Connection> {
        self.inner.as_ref().map(|inner| &inner.conn).ok_or(Error::NotOpen)
    }

    /// Configure `SQLite` for optimal performance
    async fn configure(&self) -> Result<()> {
        let conn = self.connection()?;
        // WAL has no effect for :memory: but is harmless there
        conn.execute("PRAGMA journal_mode = WAL;", ()).await.ok();
        conn.execute("PRAGMA synchronous = NORMAL;", ()).await.ok();
        conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(self.connection()?).await
    }
}
