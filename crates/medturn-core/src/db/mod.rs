//! Database layer for medturn.

mod config;
mod preferences;
mod schema;
mod turns;

pub use schema::*;
#[allow(unused_imports)]
pub use config::*;
#[allow(unused_imports)]
pub use preferences::*;
#[allow(unused_imports)]
pub use turns::*;

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// The store is missing a table or index it needs, as opposed to being
    /// unavailable. Shown to users as a configuration problem.
    pub fn is_missing_schema(&self) -> bool {
        match self {
            DbError::Sqlite(e) => {
                let message = e.to_string();
                message.contains("no such table") || message.contains("no such index")
            }
            _ => false,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// How long a write waits for another connection's lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    ///
    /// Several sessions may share one file; writers wait for each other
    /// up to [`BUSY_TIMEOUT`].
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        tracing::debug!("database schema initialized");
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"turns".to_string()));
        assert!(tables.contains(&"service_configurations".to_string()));
        assert!(tables.contains(&"app_configurations".to_string()));
        assert!(tables.contains(&"preferences".to_string()));
    }

    #[test]
    fn test_missing_schema_detection() {
        let db = Database::open_in_memory().unwrap();
        db.conn().execute_batch("DROP TABLE turns").unwrap();

        let err = db.list_recent_turns(10).unwrap_err();
        assert!(err.is_missing_schema());
        assert!(!DbError::NotFound("x".into()).is_missing_schema());
    }
}
