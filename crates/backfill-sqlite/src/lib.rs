//! SQLite-backed source store
//!
//! Reads the refreshed record range and the category reference table from a
//! SQLite copy of the legacy database.

pub mod schema;
pub mod store;

pub use store::{SqliteSourceStore, DATE_FORMAT};
