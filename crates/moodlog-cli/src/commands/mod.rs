pub mod add;
pub mod common;
pub mod delete;
pub mod edit;
pub mod list;
pub mod moods;
pub mod pending;
pub mod sync;
