//! Local preference storage.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

impl Database {
    /// Read a preference value.
    pub fn get_preference(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM preferences WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Write a preference value.
    pub fn set_preference(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a preference. Returns whether it existed.
    pub fn clear_preference(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM preferences WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}
