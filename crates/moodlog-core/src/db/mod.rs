//! Database layer for MoodLog

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{JournalRepository, SqliteJournalRepository};
