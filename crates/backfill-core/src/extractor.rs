//! Extractor: source store -> record events on the bus
//!
//! Re-reads a refreshed time range from the source store and publishes one
//! [`RecordEvent`] per row through a [`BatchPublisher`].
//!
//! Key behavior:
//! - Liveness probe before any query
//! - Query start widened by the configured lookback window
//! - Rows streamed, never collected in bulk
//! - First error wins; rows buffered before a failure are still flushed

use crate::{
    batch::BatchPublisher,
    config::BridgeConfig,
    error::Result,
    traits::{MessageWriter, SourceStore},
    types::{Category, OutboundMessage, RecordEvent, TimeWindow, RECORD_EVENT_KEY},
};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Extraction half of the refresh pipeline.
pub trait RecordExtractor {
    /// Publish every record registered between `start` (widened by the
    /// lookback window) and `end`, stamped with `year`.
    fn extract(&self, start: DateTime<Utc>, end: DateTime<Utc>, year: i32)
        -> Result<ExtractStats>;

    /// Read the whole category reference table.
    fn list_categories(&self) -> Result<Vec<Category>>;
}

#[derive(Debug, Clone, Default)]
pub struct ExtractStats {
    pub rows_processed: usize,
    pub batches_published: usize,
    pub duration: Duration,
}

pub struct Extractor<S, W> {
    store: S,
    writer: W,
    config: BridgeConfig,
}

impl<S, W> Extractor<S, W>
where
    S: SourceStore,
    W: MessageWriter,
{
    pub fn new(store: S, writer: W, config: BridgeConfig) -> Self {
        Self {
            store,
            writer,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl<S, W> RecordExtractor for Extractor<S, W>
where
    S: SourceStore,
    W: MessageWriter,
{
    fn extract(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        year: i32,
    ) -> Result<ExtractStats> {
        self.store.ping()?;

        let window = TimeWindow::new(start, end).widened(self.config.lookback_days)?;
        let started = Instant::now();
        tracing::info!(
            "Start extracting records from {} to {} for year {}",
            window.start,
            window.end,
            year
        );

        let mut batch = BatchPublisher::new(&self.writer, self.config.write_threshold);
        let mut rows = 0usize;

        let scanned = self.store.scan_records(&window, &mut |row| {
            if batch.is_full() {
                batch.flush()?;
            }
            rows += 1;
            let event = RecordEvent::from_source(row?, year);
            batch.append(OutboundMessage::json(RECORD_EVENT_KEY, &event)?);
            Ok(())
        });

        // Whatever was buffered before a failure still goes out; an earlier
        // error takes precedence over one from this flush.
        let flushed = batch.flush();
        let result = scanned.and(flushed);

        let stats = ExtractStats {
            rows_processed: rows,
            batches_published: batch.flushes(),
            duration: started.elapsed(),
        };

        match &result {
            Ok(()) => tracing::info!(
                "Finished extracting: sent {} records in {} batches, done in {:?}",
                stats.rows_processed,
                stats.batches_published,
                stats.duration
            ),
            Err(e) => tracing::info!(
                "Extraction stopped after {} records in {:?}: {}",
                stats.rows_processed,
                stats.duration,
                e
            ),
        }

        result.map(|()| stats)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = Vec::new();
        self.store.scan_categories(&mut |row| {
            categories.push(row?);
            Ok(())
        })?;

        tracing::debug!("Loaded {} categories", categories.len());
        Ok(categories)
    }
}

impl<E: RecordExtractor + ?Sized> RecordExtractor for &E {
    fn extract(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        year: i32,
    ) -> Result<ExtractStats> {
        (**self).extract(start, end, year)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        (**self).list_categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::testing::{MemoryStore, MemoryWriter};
    use crate::types::SourceRecord;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn row(id: u32) -> SourceRecord {
        SourceRecord {
            id,
            category_id: 99,
            timestamp: at(2022, 12, 20, 14),
            type_id: id % 10 + 1,
            sub_period: id % 2 + 1,
            is_deleted: id % 7 == 3,
        }
    }

    fn decode(messages: &[OutboundMessage]) -> Vec<RecordEvent> {
        messages
            .iter()
            .map(|m| {
                assert_eq!(m.key, RECORD_EVENT_KEY);
                serde_json::from_slice(&m.payload).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_extract_publishes_in_threshold_sized_batches() {
        let rows: Vec<_> = (100..114).rev().map(row).collect();
        let store = MemoryStore::with_records(rows.clone());
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(3));

        let stats = extractor
            .extract(at(2023, 3, 5, 4), at(2023, 3, 5, 4), 2030)
            .unwrap();

        let sizes: Vec<usize> = writer.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 3, 2]);
        assert_eq!(stats.rows_processed, 14);
        assert_eq!(stats.batches_published, 5);

        let expected: Vec<_> = rows
            .into_iter()
            .map(|r| RecordEvent::from_source(r, 2030))
            .collect();
        assert_eq!(decode(&writer.messages()), expected);
    }

    #[test]
    fn test_extract_queries_widened_window() {
        let store = MemoryStore::new();
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::default());

        extractor
            .extract(at(2023, 3, 5, 4), at(2023, 3, 6, 4), 2023)
            .unwrap();

        assert_eq!(
            store.record_windows(),
            vec![TimeWindow::new(at(2023, 3, 3, 0), at(2023, 3, 6, 4))]
        );
    }

    #[test]
    fn test_extract_without_rows_publishes_nothing() {
        let store = MemoryStore::new();
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(3));

        let stats = extractor
            .extract(at(2023, 3, 5, 4), at(2023, 3, 6, 4), 2023)
            .unwrap();

        assert_eq!(stats.rows_processed, 0);
        assert_eq!(writer.publish_calls(), 0);
    }

    #[test]
    fn test_extract_ping_failure_skips_query() {
        let store = MemoryStore::new().with_ping_error("ping error");
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::default());

        let err = extractor
            .extract(at(2023, 3, 5, 4), at(2023, 3, 6, 4), 2023)
            .unwrap_err();

        assert!(matches!(err, BridgeError::Store(ref m) if m == "ping error"));
        assert!(store.record_windows().is_empty());
        assert_eq!(writer.publish_calls(), 0);
    }

    #[test]
    fn test_extract_query_failure() {
        let store = MemoryStore::new().with_query_error("expected test error");
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(3));

        let err = extractor
            .extract(at(2023, 3, 5, 4), at(2023, 3, 6, 4), 2023)
            .unwrap_err();

        assert!(matches!(err, BridgeError::Store(ref m) if m == "expected test error"));
        assert_eq!(writer.publish_calls(), 0);
    }

    #[test]
    fn test_extract_row_decode_error_flushes_earlier_rows() {
        let store = MemoryStore::new()
            .push_record(row(20))
            .push_bad_record("NULL in column category_id");
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(3));

        let err = extractor
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2030)
            .unwrap_err();

        assert!(matches!(err, BridgeError::RowDecode(_)));
        assert_eq!(writer.publish_calls(), 1);
        let published = decode(&writer.messages());
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, 20);
    }

    #[test]
    fn test_extract_stops_scanning_after_decode_error() {
        let store = MemoryStore::new()
            .push_record(row(30))
            .push_bad_record("bad row")
            .push_record(row(28));
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(1));

        let err = extractor
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2030)
            .unwrap_err();

        assert!(matches!(err, BridgeError::RowDecode(_)));
        let ids: Vec<u32> = decode(&writer.messages()).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![30]);
    }

    #[test]
    fn test_extract_writer_error() {
        let store = MemoryStore::with_records(vec![row(20)]);
        let writer = MemoryWriter::failing("expected test error");
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(1));

        let err = extractor
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2030)
            .unwrap_err();

        assert!(matches!(err, BridgeError::Transport(ref m) if m == "expected test error"));
        assert_eq!(writer.publish_calls(), 1);
    }

    #[test]
    fn test_extract_first_publish_error_wins() {
        let rows: Vec<_> = (1..=5).map(row).collect();
        let store = MemoryStore::with_records(rows);
        let writer = MemoryWriter::new().fail_from_call(1, "first failure");
        let extractor = Extractor::new(&store, &writer, BridgeConfig::new().with_write_threshold(2));

        let err = extractor
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2030)
            .unwrap_err();

        // Batch 1 succeeded, batch 2 failed and stopped the scan before row 5.
        assert!(matches!(err, BridgeError::Transport(ref m) if m == "first failure"));
        assert_eq!(writer.publish_calls(), 2);
        assert_eq!(writer.messages().len(), 2);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let rows: Vec<_> = (1..=7).rev().map(row).collect();
        let store = MemoryStore::with_records(rows);
        let first = MemoryWriter::new();
        let second = MemoryWriter::new();
        let config = BridgeConfig::new().with_write_threshold(4);

        Extractor::new(&store, &first, config.clone())
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2023)
            .unwrap();
        Extractor::new(&store, &second, config)
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2023)
            .unwrap();

        assert_eq!(first.messages(), second.messages());
        assert_eq!(store.record_windows()[0], store.record_windows()[1]);
    }

    #[test]
    fn test_every_record_carries_signal_year() {
        let store = MemoryStore::with_records((1..=4).map(row).collect());
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::default());

        extractor
            .extract(at(2023, 3, 5, 0), at(2023, 3, 5, 4), 2031)
            .unwrap();

        let events = decode(&writer.messages());
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.year == 2031));
    }

    #[test]
    fn test_list_categories() {
        let categories = vec![
            Category {
                id: 30,
                short_name: "Lec".into(),
                long_name: "Lecture".into(),
            },
            Category {
                id: 31,
                short_name: "Lab".into(),
                long_name: "Laboratory".into(),
            },
        ];
        let store = MemoryStore::new().with_categories(categories.clone());
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::default());

        assert_eq!(extractor.list_categories().unwrap(), categories);
        assert_eq!(writer.publish_calls(), 0);
    }

    #[test]
    fn test_list_categories_decode_error() {
        let store = MemoryStore::new().push_bad_category("NULL in column long_name");
        let writer = MemoryWriter::new();
        let extractor = Extractor::new(&store, &writer, BridgeConfig::default());

        assert!(matches!(
            extractor.list_categories(),
            Err(BridgeError::RowDecode(_))
        ));
    }
}
