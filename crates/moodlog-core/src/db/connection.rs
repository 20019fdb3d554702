//! Database connection management

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// Database wrapper for the on-device SQLite journal
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        tracing::debug!("Opened journal database at {}", path.as_ref().display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for a single-device app
    fn configure(&self) -> Result<()> {
        // In-memory databases report "memory" here instead of switching to WAL
        let journal_mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("SQLite journal mode: {journal_mode}");

        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Counter that changes whenever another connection commits to the file
    pub fn data_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "data_version", |row| row.get(0))?)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let value: i32 = db
            .connection()
            .query_row("SELECT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_open_file_persists_schema() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("moodlog.db");

        {
            let db = Database::open(&db_path).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO journal_entries (user_id, content, date, time, mood)
                     VALUES ('user-1', 'hello', '1', '1', 'Neutral')",
                    [],
                )
                .unwrap();
        }

        let reopened = Database::open(&db_path).unwrap();
        let count: i64 = reopened
            .connection()
            .query_row("SELECT COUNT(*) FROM journal_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_data_version_tracks_other_connections() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("moodlog.db");
        let watcher = Database::open(&db_path).unwrap();
        let writer = Database::open(&db_path).unwrap();
        let before = watcher.data_version().unwrap();

        // Own commits leave the counter alone
        watcher
            .connection()
            .execute(
                "INSERT INTO journal_entries (user_id, content, date, time, mood)
                 VALUES ('user-1', 'mine', '1', '1', 'Neutral')",
                [],
            )
            .unwrap();
        assert_eq!(watcher.data_version().unwrap(), before);

        writer
            .connection()
            .execute(
                "INSERT INTO journal_entries (user_id, content, date, time, mood)
                 VALUES ('user-1', 'theirs', '1', '1', 'Neutral')",
                [],
            )
            .unwrap();
        assert_ne!(watcher.data_version().unwrap(), before);
    }
}
