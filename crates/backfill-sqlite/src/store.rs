use backfill_core::{
    error::{BridgeError, Result},
    traits::{RowVisitor, SourceStore},
    types::{Category, SourceRecord, TimeWindow},
};
use rusqlite::{Connection, OpenFlags, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::schema::{self, CATEGORY_QUERY, RECORD_RANGE_QUERY};

/// Format of the range bounds bound into [`RECORD_RANGE_QUERY`].
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source store backed by a SQLite database file
pub struct SqliteSourceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSourceStore {
    /// Open an existing database read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(BridgeError::store)?;

        tracing::info!("Opened source database at {}", path.as_ref().display());
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already configured connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create the source tables if they do not exist yet.
    pub fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::create_tables(&conn)
    }

    /// Get the underlying connection (for fixtures and custom queries)
    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BridgeError::Store(format!("connection lock poisoned: {}", e)))
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        id: row.get(0)?,
        category_id: row.get(1)?,
        timestamp: row.get(2)?,
        type_id: row.get(3)?,
        sub_period: row.get(4)?,
        is_deleted: row.get(5)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        short_name: row.get(1)?,
        long_name: row.get(2)?,
    })
}

impl SourceStore for SqliteSourceStore {
    fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(BridgeError::store)?;
        Ok(())
    }

    fn scan_records(
        &self,
        window: &TimeWindow,
        visit: &mut RowVisitor<'_, SourceRecord>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(RECORD_RANGE_QUERY)
            .map_err(BridgeError::store)?;

        let start = window.start.format(DATE_FORMAT).to_string();
        let end = window.end.format(DATE_FORMAT).to_string();
        let mut rows = stmt.query([&start, &end]).map_err(BridgeError::store)?;

        while let Some(row) = rows.next().map_err(BridgeError::store)? {
            visit(record_from_row(row).map_err(BridgeError::row_decode))?;
        }
        Ok(())
    }

    fn scan_categories(&self, visit: &mut RowVisitor<'_, Category>) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(CATEGORY_QUERY)
            .map_err(BridgeError::store)?;
        let mut rows = stmt.query([]).map_err(BridgeError::store)?;

        while let Some(row) = rows.next().map_err(BridgeError::store)? {
            visit(category_from_row(row).map_err(BridgeError::row_decode))?;
        }
        Ok(())
    }
}
