//! Shared async services for client crates.

mod journal;

pub use journal::JournalService;
