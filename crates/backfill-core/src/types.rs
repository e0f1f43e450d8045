//! Domain values exchanged with the bus and read from the source store.

use crate::error::{BridgeError, Result};
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Key of the inbound event announcing a refreshed source database.
pub const REFRESH_SIGNAL_KEY: &str = "source_db_refreshed";

/// Key of every extracted record message.
pub const RECORD_EVENT_KEY: &str = "record";

/// Key of the notification sent once all records of a refresh were published.
pub const REFRESH_PROCESSED_KEY: &str = "source_db_records_processed";

/// Key of the notification carrying the category reference list.
pub const CATEGORY_LIST_KEY: &str = "category_list";

/// Inbound event: the source database now holds data up to `current_refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSignal {
    #[serde(rename = "previousRefreshTimestamp")]
    pub previous_refresh: DateTime<Utc>,
    #[serde(rename = "currentRefreshTimestamp")]
    pub current_refresh: DateTime<Utc>,
    pub year: i32,
}

/// One row of the source table, before it is bound to a reporting year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: u32,
    pub category_id: u32,
    pub timestamp: DateTime<Utc>,
    pub type_id: u32,
    pub sub_period: u32,
    pub is_deleted: bool,
}

/// Outbound record event. `year` always comes from the triggering signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEvent {
    pub id: u32,
    pub category_id: u32,
    pub timestamp: DateTime<Utc>,
    pub type_id: u32,
    pub sub_period: u32,
    pub is_deleted: bool,
    pub year: i32,
}

impl RecordEvent {
    pub fn from_source(row: SourceRecord, year: i32) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            timestamp: row.timestamp,
            type_id: row.type_id,
            sub_period: row.sub_period,
            is_deleted: row.is_deleted,
            year,
        }
    }
}

/// Reference data describing a record's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u32,
    pub short_name: String,
    pub long_name: String,
}

/// Sent after every record of a refresh has been published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshProcessed {
    #[serde(rename = "previousRefreshTimestamp")]
    pub previous_refresh: DateTime<Utc>,
    #[serde(rename = "currentRefreshTimestamp")]
    pub current_refresh: DateTime<Utc>,
    pub year: i32,
}

impl From<&RefreshSignal> for RefreshProcessed {
    fn from(signal: &RefreshSignal) -> Self {
        Self {
            previous_refresh: signal.previous_refresh,
            current_refresh: signal.current_refresh,
            year: signal.year,
        }
    }
}

/// Full category list for a reporting year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryList {
    pub year: i32,
    pub categories: Vec<Category>,
}

/// Inclusive time range of source rows to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Move `start` back by `days` and truncate it to midnight. `end` is kept.
    pub fn widened(self, days: u64) -> Result<Self> {
        let day = self
            .start
            .date_naive()
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| {
                BridgeError::Config(format!("lookback of {} days underflows {}", days, self.start))
            })?;
        let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        Ok(Self {
            start,
            end: self.end,
        })
    }
}

/// Where an inbound message lives on the bus, used to commit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A keyed message read from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub position: MessagePosition,
}

impl InboundMessage {
    pub fn has_key(&self, key: &str) -> bool {
        self.key == key.as_bytes()
    }

    /// Decode the JSON payload. Failures are reported as [`BridgeError::Decode`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(BridgeError::Decode)
    }
}

/// A keyed message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: String,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn json<T: Serialize>(key: &str, value: &T) -> Result<Self> {
        Ok(Self {
            key: key.to_string(),
            payload: serde_json::to_vec(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_widened_truncates_to_midnight() {
        let window = TimeWindow::new(at(2023, 3, 5, 4), at(2023, 3, 6, 4));
        let widened = window.widened(2).unwrap();
        assert_eq!(widened.start, at(2023, 3, 3, 0));
        assert_eq!(widened.end, window.end);
    }

    #[test]
    fn test_widened_crosses_month_boundary() {
        let window = TimeWindow::new(at(2023, 3, 1, 23), at(2023, 3, 2, 4));
        assert_eq!(window.widened(2).unwrap().start, at(2023, 2, 27, 0));
    }

    #[test]
    fn test_refresh_signal_wire_format() {
        let signal = RefreshSignal {
            previous_refresh: at(2023, 4, 10, 4),
            current_refresh: at(2023, 4, 11, 4),
            year: 2023,
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["previousRefreshTimestamp"], "2023-04-10T04:00:00Z");
        assert_eq!(json["currentRefreshTimestamp"], "2023-04-11T04:00:00Z");
        assert_eq!(json["year"], 2023);
    }

    #[test]
    fn test_record_event_takes_year_from_argument() {
        let row = SourceRecord {
            id: 7,
            category_id: 99,
            timestamp: at(2022, 12, 20, 14),
            type_id: 3,
            sub_period: 1,
            is_deleted: false,
        };
        let event = RecordEvent::from_source(row, 2030);
        assert_eq!(event.year, 2030);
        assert_eq!(event.id, 7);
    }

    #[test]
    fn test_inbound_decode_error_kind() {
        let message = InboundMessage {
            key: REFRESH_SIGNAL_KEY.as_bytes().to_vec(),
            payload: b"{not json".to_vec(),
            position: MessagePosition {
                topic: "meta".into(),
                partition: 0,
                offset: 0,
            },
        };
        assert!(message.has_key(REFRESH_SIGNAL_KEY));
        assert!(matches!(
            message.decode::<RefreshSignal>(),
            Err(BridgeError::Decode(_))
        ));
    }
}
