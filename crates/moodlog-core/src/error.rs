//! Error types for moodlog-core

use thiserror::Error;

use crate::store::RemoteError;

/// Result type alias using moodlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in moodlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal entry not found
    #[error("Journal entry not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No signed-in user to sync for
    #[error("No user is signed in")]
    NotSignedIn,

    /// Remote journal store error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
