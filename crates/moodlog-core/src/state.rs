//! Sync state shared between the engine and whatever renders it.

use std::fmt;

/// Coarse sync status published by the sync engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No session running, or nobody is signed in.
    #[default]
    Offline,
    /// A snapshot of sync candidates is being pushed.
    Syncing,
    /// The last pass drained every candidate.
    Synced,
    /// The last pass left failed candidates behind.
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}
