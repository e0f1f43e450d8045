//! Extraction from an on-disk SQLite source into an in-memory bus

use backfill_core::testing::{MemoryReader, MemoryWriter};
use backfill_core::*;
use backfill_sqlite::{schema, SqliteSourceStore};
use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tempfile::TempDir;

fn create_source(rows: u32) -> (TempDir, std::path::PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("source.db");

    let conn = Connection::open(&path).unwrap();
    schema::create_tables(&conn).unwrap();
    for id in 1..=rows {
        conn.execute(
            "INSERT INTO records (id, category_id, occurred_at, type_id, sub_period, status, registered_at)
             VALUES (?1, ?2, '2023-03-04 10:00:00', ?3, 1, ?4, '2023-03-04 12:00:00')",
            rusqlite::params![id, 100 + id, id % 5, if id % 7 == 3 { 0 } else { 1 }],
        )
        .unwrap();
    }
    // Registered before the lookback window.
    conn.execute(
        "INSERT INTO records (id, category_id, occurred_at, type_id, sub_period, status, registered_at)
         VALUES (1000, 1, '2023-02-01 10:00:00', 1, 1, 1, '2023-02-01 10:00:00')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO categories (id, short_name, long_name) VALUES (30, 'Lec', 'Lecture')",
        [],
    )
    .unwrap();

    (temp_dir, path)
}

#[test]
fn test_extract_from_sqlite() {
    let (_temp, path) = create_source(14);
    let store = SqliteSourceStore::open(&path).unwrap();
    let writer = MemoryWriter::new();
    let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(3));

    // The lookback window reaches back to 2023-03-04 00:00.
    let stats = extractor
        .extract(
            Utc.with_ymd_and_hms(2023, 3, 6, 4, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 3, 7, 4, 0, 0).unwrap(),
            2023,
        )
        .unwrap();

    assert_eq!(stats.rows_processed, 14);
    assert_eq!(writer.publish_calls(), 5);

    let events: Vec<RecordEvent> = writer
        .messages()
        .iter()
        .map(|m| serde_json::from_slice(&m.payload).unwrap())
        .collect();

    let ids: Vec<u32> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, (1..=14).rev().collect::<Vec<_>>());

    let third = events.iter().find(|e| e.id == 3).unwrap();
    assert_eq!(
        *third,
        RecordEvent {
            id: 3,
            category_id: 103,
            timestamp: Utc.with_ymd_and_hms(2023, 3, 4, 10, 0, 0).unwrap(),
            type_id: 3,
            sub_period: 1,
            is_deleted: true,
            year: 2023,
        }
    );
}

#[test]
fn test_refresh_cycle_over_sqlite() {
    let (_temp, path) = create_source(4);
    let store = SqliteSourceStore::open(&path).unwrap();
    let records = MemoryWriter::new();
    let meta = MemoryWriter::new();

    let signal = RefreshSignal {
        previous_refresh: Utc.with_ymd_and_hms(2023, 3, 5, 4, 0, 0).unwrap(),
        current_refresh: Utc.with_ymd_and_hms(2023, 3, 6, 4, 0, 0).unwrap(),
        year: 2023,
    };
    let reader = MemoryReader::new().push(InboundMessage {
        key: REFRESH_SIGNAL_KEY.as_bytes().to_vec(),
        payload: serde_json::to_vec(&signal).unwrap(),
        position: MessagePosition {
            topic: "meta_events".into(),
            partition: 0,
            offset: 42,
        },
    });

    let extractor = Extractor::new(&store, &records, BridgeConfig::default());
    let mut dispatch = DispatchLoop::new(reader.clone(), extractor, BusNotifier::new(&meta));

    assert!(dispatch.run().is_cancelled());

    assert_eq!(reader.committed().len(), 1);
    assert_eq!(reader.committed()[0].position.offset, 42);
    assert_eq!(records.publish_calls(), 1);
    assert_eq!(records.messages().len(), 4);

    let list: CategoryList = serde_json::from_slice(&meta.messages()[0].payload).unwrap();
    assert_eq!(list.categories.len(), 1);
    assert_eq!(list.categories[0].long_name, "Lecture");
}

#[test]
fn test_open_missing_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let result = SqliteSourceStore::open(temp_dir.path().join("missing.db"));
    assert!(matches!(result, Err(BridgeError::Store(_))));
}

#[test]
fn test_extract_wide_type_and_sub_period_values() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("source.db");
    let conn = Connection::open(&path).unwrap();
    schema::create_tables(&conn).unwrap();
    conn.execute(
        "INSERT INTO records (id, category_id, occurred_at, type_id, sub_period, status, registered_at)
         VALUES (1, 7, '2023-03-04 10:00:00', 300, 70000, 1, '2023-03-04 12:00:00')",
        [],
    )
    .unwrap();
    drop(conn);

    let store = SqliteSourceStore::open(&path).unwrap();
    let writer = MemoryWriter::new();
    let extractor = Extractor::new(&store, &writer, BridgeConfig::default());

    let stats = extractor
        .extract(
            Utc.with_ymd_and_hms(2023, 3, 5, 4, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 3, 6, 4, 0, 0).unwrap(),
            2023,
        )
        .unwrap();

    assert_eq!(stats.rows_processed, 1);
    let event: RecordEvent = serde_json::from_slice(&writer.messages()[0].payload).unwrap();
    assert_eq!(event.type_id, 300);
    assert_eq!(event.sub_period, 70000);
}
