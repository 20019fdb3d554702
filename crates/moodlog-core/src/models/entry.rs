//! Journal entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Mood;
use crate::util::unix_millis_now;

/// Local primary key of a journal entry. Never leaves the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(i64);

impl EntryId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Geotag attached to an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Reverse-geocoded address, may be empty
    pub address: String,
}

impl Location {
    /// Build a location from the flat triple used by storage and the wire.
    ///
    /// `0.0, 0.0, ""` is how the mobile app encodes "no location".
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn from_parts(latitude: f64, longitude: f64, address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        if latitude == 0.0 && longitude == 0.0 && address.trim().is_empty() {
            None
        } else {
            Some(Self {
                latitude,
                longitude,
                address,
            })
        }
    }
}

/// User-authored fields of an entry. Also the payload sent to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    /// Free-text note
    pub content: String,
    /// Day the entry is about (Unix ms as text)
    pub date: String,
    /// When the entry was posted (Unix ms as text)
    pub time: String,
    pub mood: Mood,
    pub location: Option<Location>,
    /// Base64 image payload, empty when there is no photo
    pub image: String,
}

impl EntryFields {
    /// Fields for a new entry written now
    #[must_use]
    pub fn new(content: impl Into<String>, mood: Mood) -> Self {
        let now = unix_millis_now().to_string();
        Self {
            content: content.into(),
            date: now.clone(),
            time: now,
            mood,
            location: None,
            image: String::new(),
        }
    }

    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Parse `date` as Unix milliseconds
    #[must_use]
    pub fn date_millis(&self) -> Option<i64> {
        self.date.trim().parse().ok()
    }

    /// Whether there is an image attached
    #[must_use]
    pub fn has_image(&self) -> bool {
        !self.image.is_empty()
    }
}

/// What the sync engine has to do with an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Never pushed: create it remotely
    Create,
    /// Edited since the last push: update the remote document
    Update,
    /// Tombstoned after being pushed: delete remotely, then purge
    Delete,
    /// Tombstoned before ever being pushed: purge locally, no remote call
    Purge,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Purge => "purge",
        };
        f.write_str(label)
    }
}

/// A journal entry as stored on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    /// Remote document id, empty until the first successful push
    pub remote_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub fields: EntryFields,
    /// Soft delete tombstone
    pub is_deleted: bool,
    /// Dirty flag: edited since the last successful remote write
    pub needs_update: bool,
    /// Local edit counter, bumped by every authoring edit
    pub revision: i64,
}

impl JournalEntry {
    /// Whether the remote store has seen this entry
    #[must_use]
    pub fn is_synced_remotely(&self) -> bool {
        !self.remote_id.trim().is_empty()
    }

    /// Classify the entry for the push phase.
    ///
    /// Tombstones take priority, then creation, then updates.
    #[must_use]
    pub fn sync_action(&self) -> Option<SyncAction> {
        if self.is_deleted {
            if self.is_synced_remotely() {
                Some(SyncAction::Delete)
            } else {
                Some(SyncAction::Purge)
            }
        } else if !self.is_synced_remotely() {
            Some(SyncAction::Create)
        } else if self.needs_update {
            Some(SyncAction::Update)
        } else {
            None
        }
    }

    /// First line of content, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.fields
            .content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

/// A journal document as held by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJournal {
    pub remote_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub fields: EntryFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(remote_id: &str, is_deleted: bool, needs_update: bool) -> JournalEntry {
        JournalEntry {
            id: EntryId::new(1),
            remote_id: remote_id.to_string(),
            user_id: "user-1".to_string(),
            fields: EntryFields::new("Hello", Mood::Neutral),
            is_deleted,
            needs_update,
            revision: 0,
        }
    }

    #[test]
    fn test_sync_action_create() {
        assert_eq!(entry("", false, false).sync_action(), Some(SyncAction::Create));
        // Unpushed edits are still a creation
        assert_eq!(entry("", false, true).sync_action(), Some(SyncAction::Create));
    }

    #[test]
    fn test_sync_action_update() {
        assert_eq!(entry("R1", false, true).sync_action(), Some(SyncAction::Update));
    }

    #[test]
    fn test_sync_action_delete_and_purge() {
        assert_eq!(entry("R1", true, false).sync_action(), Some(SyncAction::Delete));
        assert_eq!(entry("R1", true, true).sync_action(), Some(SyncAction::Delete));
        assert_eq!(entry("", true, false).sync_action(), Some(SyncAction::Purge));
        assert_eq!(entry("  ", true, true).sync_action(), Some(SyncAction::Purge));
    }

    #[test]
    fn test_sync_action_clean_entry() {
        assert_eq!(entry("R1", false, false).sync_action(), None);
    }

    #[test]
    fn test_location_from_parts_treats_zero_triple_as_none() {
        assert_eq!(Location::from_parts(0.0, 0.0, ""), None);
        let loc = Location::from_parts(54.57, -1.23, "Middlesbrough").unwrap();
        assert_eq!(loc.address, "Middlesbrough");
        assert!(Location::from_parts(0.0, 0.0, "Null Island").is_some());
    }

    #[test]
    fn test_entry_fields_new_sets_timestamps() {
        let fields = EntryFields::new("Today was fine", Mood::Satisfied);
        assert!(fields.date_millis().unwrap() > 0);
        assert_eq!(fields.date, fields.time);
        assert!(!fields.has_image());
        assert_eq!(fields.location, None);
    }

    #[test]
    fn test_entry_id_parse() {
        assert_eq!("42".parse::<EntryId>().unwrap(), EntryId::new(42));
        assert!("abc".parse::<EntryId>().is_err());
    }

    #[test]
    fn test_title_preview() {
        let mut e = entry("", false, false);
        e.fields.content = "First line\nSecond line".to_string();
        assert_eq!(e.title_preview(50), "First line");
        assert_eq!(e.title_preview(5), "First");
    }
}
