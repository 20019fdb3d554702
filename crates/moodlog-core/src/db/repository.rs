//! Journal repository implementation

use crate::error::{Error, Result};
use crate::models::{EntryFields, EntryId, JournalEntry, Location, Mood, RemoteJournal};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

const ENTRY_COLUMNS: &str = "id, remote_id, user_id, content, date, time, mood, latitude, longitude, address, image, is_deleted, needs_update, revision";

/// Trait for journal storage operations
///
/// Every mutation is a single-statement, field-level update so that the
/// authoring surface and the sync engine can write the same row concurrently.
pub trait JournalRepository {
    /// Insert a new, never-synced entry
    fn insert(&self, user_id: &str, fields: &EntryFields) -> Result<JournalEntry>;

    /// Insert an entry pulled from the remote store (already synced)
    fn insert_synced(&self, remote: &RemoteJournal) -> Result<JournalEntry>;

    /// Get an entry by ID, tombstones included
    fn get(&self, id: EntryId) -> Result<Option<JournalEntry>>;

    /// Replace authored fields after a local edit and mark the entry dirty
    fn update_fields(&self, id: EntryId, fields: &EntryFields) -> Result<JournalEntry>;

    /// Overwrite authored fields with remote values.
    ///
    /// Skipped (returns `false`) when the row is tombstoned or dirty.
    fn apply_remote(&self, id: EntryId, fields: &EntryFields) -> Result<bool>;

    /// Soft delete an entry
    fn mark_deleted(&self, id: EntryId) -> Result<()>;

    /// Hard delete an entry
    fn purge(&self, id: EntryId) -> Result<bool>;

    /// Hard delete a synced entry only if it has no pending local changes
    fn remove_synced(&self, id: EntryId) -> Result<bool>;

    /// List a user's visible entries, newest date first
    fn list_for_user(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    /// List every row of a user, tombstones included, in insertion order
    fn list_with_tombstones(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    /// List a user's sync candidates in insertion order
    fn sync_candidates(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    /// Record the remote id assigned on first push.
    ///
    /// Only fills an empty remote id; returns whether the row changed.
    fn set_remote_id(&self, id: EntryId, remote_id: &str) -> Result<bool>;

    /// Clear the dirty flag if the row is still at `revision`
    fn clear_needs_update(&self, id: EntryId, revision: i64) -> Result<bool>;
}

/// `SQLite` implementation of `JournalRepository`
pub struct SqliteJournalRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteJournalRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_entries(&self, sql: &str, user_id: &str) -> Result<Vec<JournalEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params![user_id], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn insert_row(
        &self,
        remote_id: &str,
        user_id: &str,
        fields: &EntryFields,
    ) -> Result<JournalEntry> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("User id cannot be empty".into()));
        }

        let (latitude, longitude, address) = location_columns(fields.location.as_ref());
        self.conn.execute(
            "INSERT INTO journal_entries
                (remote_id, user_id, content, date, time, mood, latitude, longitude, address, image)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                remote_id,
                user_id,
                fields.content,
                fields.date,
                fields.time,
                fields.mood.as_str(),
                latitude,
                longitude,
                address,
                fields.image,
            ],
        )?;

        let id = EntryId::new(self.conn.last_insert_rowid());
        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
        let mood: String = row.get(6)?;
        let mood = mood
            .parse::<Mood>()
            .map_err(|error| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(error)))?;

        let latitude: Option<f64> = row.get(7)?;
        let longitude: Option<f64> = row.get(8)?;
        let address: Option<String> = row.get(9)?;
        let location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
                address: address.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(JournalEntry {
            id: EntryId::new(row.get(0)?),
            remote_id: row.get(1)?,
            user_id: row.get(2)?,
            fields: EntryFields {
                content: row.get(3)?,
                date: row.get(4)?,
                time: row.get(5)?,
                mood,
                location,
                image: row.get(10)?,
            },
            is_deleted: row.get::<_, i32>(11)? != 0,
            needs_update: row.get::<_, i32>(12)? != 0,
            revision: row.get(13)?,
        })
    }
}

fn location_columns(location: Option<&Location>) -> (Option<f64>, Option<f64>, Option<&str>) {
    location.map_or((None, None, None), |loc| {
        (
            Some(loc.latitude),
            Some(loc.longitude),
            Some(loc.address.as_str()),
        )
    })
}

impl JournalRepository for SqliteJournalRepository<'_> {
    fn insert(&self, user_id: &str, fields: &EntryFields) -> Result<JournalEntry> {
        self.insert_row("", user_id, fields)
    }

    fn insert_synced(&self, remote: &RemoteJournal) -> Result<JournalEntry> {
        if remote.remote_id.trim().is_empty() {
            return Err(Error::InvalidInput("Remote id cannot be empty".into()));
        }
        self.insert_row(&remote.remote_id, &remote.user_id, &remote.fields)
    }

    fn get(&self, id: EntryId) -> Result<Option<JournalEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = ?"),
                params![id.get()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn update_fields(&self, id: EntryId, fields: &EntryFields) -> Result<JournalEntry> {
        let (latitude, longitude, address) = location_columns(fields.location.as_ref());
        let rows = self.conn.execute(
            "UPDATE journal_entries
             SET content = ?, date = ?, time = ?, mood = ?, latitude = ?, longitude = ?,
                 address = ?, image = ?, needs_update = 1, revision = revision + 1
             WHERE id = ? AND is_deleted = 0",
            params![
                fields.content,
                fields.date,
                fields.time,
                fields.mood.as_str(),
                latitude,
                longitude,
                address,
                fields.image,
                id.get(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn apply_remote(&self, id: EntryId, fields: &EntryFields) -> Result<bool> {
        let (latitude, longitude, address) = location_columns(fields.location.as_ref());
        let rows = self.conn.execute(
            "UPDATE journal_entries
             SET content = ?, date = ?, time = ?, mood = ?, latitude = ?, longitude = ?,
                 address = ?, image = ?
             WHERE id = ? AND is_deleted = 0 AND needs_update = 0",
            params![
                fields.content,
                fields.date,
                fields.time,
                fields.mood.as_str(),
                latitude,
                longitude,
                address,
                fields.image,
                id.get(),
            ],
        )?;
        Ok(rows > 0)
    }

    fn mark_deleted(&self, id: EntryId) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE journal_entries SET is_deleted = 1, revision = revision + 1
             WHERE id = ? AND is_deleted = 0",
            params![id.get()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn purge(&self, id: EntryId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM journal_entries WHERE id = ?", params![id.get()])?;
        Ok(rows > 0)
    }

    fn remove_synced(&self, id: EntryId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM journal_entries
             WHERE id = ? AND remote_id != '' AND needs_update = 0 AND is_deleted = 0",
            params![id.get()],
        )?;
        Ok(rows > 0)
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS}
                 FROM journal_entries
                 WHERE user_id = ? AND is_deleted = 0
                 ORDER BY CAST(date AS INTEGER) DESC, id DESC"
            ),
            user_id,
        )
    }

    fn list_with_tombstones(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS}
                 FROM journal_entries
                 WHERE user_id = ?
                 ORDER BY id ASC"
            ),
            user_id,
        )
    }

    fn sync_candidates(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS}
                 FROM journal_entries
                 WHERE user_id = ?
                   AND ((remote_id = '' AND is_deleted = 0) OR needs_update = 1 OR is_deleted = 1)
                 ORDER BY id ASC"
            ),
            user_id,
        )
    }

    fn set_remote_id(&self, id: EntryId, remote_id: &str) -> Result<bool> {
        if remote_id.trim().is_empty() {
            return Err(Error::InvalidInput("Remote id cannot be empty".into()));
        }
        let rows = self.conn.execute(
            "UPDATE journal_entries SET remote_id = ? WHERE id = ? AND remote_id = ''",
            params![remote_id, id.get()],
        )?;
        Ok(rows > 0)
    }

    fn clear_needs_update(&self, id: EntryId, revision: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE journal_entries SET needs_update = 0 WHERE id = ? AND revision = ? AND needs_update = 1",
            params![id.get(), revision],
        )?;
        Ok(rows > 0)
    }
}
