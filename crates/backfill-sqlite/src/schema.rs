use backfill_core::error::{BridgeError, Result};
use rusqlite::Connection;

/// Records registered inside a time range, newest id first.
///
/// `status = 0` marks a record deleted in the source system.
pub const RECORD_RANGE_QUERY: &str = "SELECT id, category_id, occurred_at, type_id, sub_period,
    (CASE status WHEN 0 THEN 1 ELSE 0 END) AS is_deleted
FROM records WHERE registered_at BETWEEN ?1 AND ?2 ORDER BY id DESC";

pub const CATEGORY_QUERY: &str = "SELECT id, short_name, long_name FROM categories";

/// Create the source tables
///
/// The production database is maintained by the upstream system; this is
/// used for local fixtures and tests.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY,
            category_id INTEGER,
            occurred_at TEXT,
            type_id INTEGER,
            sub_period INTEGER,
            status INTEGER NOT NULL DEFAULT 1,
            registered_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS records_registered_at ON records (registered_at);

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            short_name TEXT,
            long_name TEXT
        );",
    )
    .map_err(BridgeError::store)
}
