//! Core data types for the tickbar pipeline.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column holding the trade timestamp.
pub const TIMESTAMP_FIELD: &str = "Timestamp";
/// Column holding the trade price.
pub const PRICE_FIELD: &str = "Price";
/// Column holding the trade size.
pub const SIZE_FIELD: &str = "Size";

/// Columns every input batch must carry.
pub const REQUIRED_FIELDS: [&str; 3] = [TIMESTAMP_FIELD, PRICE_FIELD, SIZE_FIELD];

/// Layout of tick timestamps, e.g. `2024-09-16 10:00:05.123456`.
///
/// The fractional part is read with `%.f`, so a missing fraction is tolerated.
pub const TICK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Layout of bar timestamps and window bounds, e.g. `2024-09-16 10:00:00`.
pub const BAR_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a tick timestamp string.
pub fn parse_tick_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TICK_TIMESTAMP_FORMAT)
        .map_err(|e| Error::invalid_timestamp(format!("{s:?}: {e}")))
}

/// Parse a window bound such as `2024-09-16 10:00:00`.
pub fn parse_window_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), BAR_TIMESTAMP_FORMAT)
        .map_err(|e| Error::invalid_timestamp(format!("{s:?}: {e} (expected YYYY-MM-DD HH:MM:SS)")))
}

/// One raw row from an input batch.
///
/// Column names are shared between all rows of a batch. Values are kept as
/// the strings that were read; nothing is parsed until cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl RawRecord {
    /// Create a record from a shared header and the row's values.
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    /// Build a record from `(column, value)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let columns: Arc<[String]> = pairs.iter().map(|(k, _)| k.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| v.to_string()).collect();
        Self { columns, values }
    }

    /// Look up a value by column name. `None` if the column is absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// Column names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Shared handle to the column names.
    pub fn columns_arc(&self) -> &Arc<[String]> {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The raw `Timestamp` value, if present.
    #[inline]
    pub fn timestamp(&self) -> Option<&str> {
        self.get(TIMESTAMP_FIELD)
    }

    /// The raw `Price` value, if present.
    #[inline]
    pub fn price(&self) -> Option<&str> {
        self.get(PRICE_FIELD)
    }

    /// The raw `Size` value, if present.
    #[inline]
    pub fn size(&self) -> Option<&str> {
        self.get(SIZE_FIELD)
    }
}

/// A raw record that passed validation, with its price already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    raw: RawRecord,
    price: f64,
}

impl CleanRecord {
    /// Wrap a validated record. `price` must be the parsed `Price` column.
    pub fn new(raw: RawRecord, price: f64) -> Self {
        Self { raw, price }
    }

    /// Parsed price.
    #[inline]
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Raw timestamp string (empty if the column was absent).
    #[inline]
    pub fn timestamp(&self) -> &str {
        self.raw.timestamp().unwrap_or_default()
    }

    /// Raw size string.
    #[inline]
    pub fn size(&self) -> &str {
        self.raw.size().unwrap_or_default()
    }

    /// Parse the size column.
    pub fn parse_size(&self) -> Result<f64> {
        let size = self.size();
        size.trim()
            .parse::<f64>()
            .map_err(|_| Error::data(format!("unparseable size {size:?} at {}", self.timestamp())))
    }

    /// Parse the timestamp column.
    pub fn parse_timestamp(&self) -> Result<NaiveDateTime> {
        parse_tick_timestamp(self.timestamp())
    }

    /// The underlying row with all passthrough columns.
    pub fn raw(&self) -> &RawRecord {
        &self.raw
    }

    /// Give back the underlying row.
    pub fn into_raw(self) -> RawRecord {
        self.raw
    }
}

/// Why a raw record was dropped during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// `Price` or `Size` empty or absent.
    MissingField,
    /// `Price` is not a finite number.
    NumericConversion,
    /// `Price` is zero or negative.
    NonPositivePrice,
    /// `Price` outside the configured bounds.
    OutlierPrice,
    /// `Timestamp` already accepted earlier in the same batch.
    DuplicateTimestamp,
}

impl RejectReason {
    /// All reasons, in check order.
    pub const ALL: [RejectReason; 5] = [
        RejectReason::MissingField,
        RejectReason::NumericConversion,
        RejectReason::NonPositivePrice,
        RejectReason::OutlierPrice,
        RejectReason::DuplicateTimestamp,
    ];

    /// Short label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::MissingField => "missing_field",
            RejectReason::NumericConversion => "numeric_conversion",
            RejectReason::NonPositivePrice => "non_positive_price",
            RejectReason::OutlierPrice => "outlier_price",
            RejectReason::DuplicateTimestamp => "duplicate_timestamp",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLCV bar over `[timestamp, timestamp + interval)`.
///
/// Serializes to the `Timestamp,Open,High,Low,Close,Volume` CSV layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start.
    #[serde(rename = "Timestamp", with = "bar_timestamp")]
    pub timestamp: NaiveDateTime,
    /// Price of the first trade in the bucket.
    #[serde(rename = "Open")]
    pub open: f64,
    /// Highest price.
    #[serde(rename = "High")]
    pub high: f64,
    /// Lowest price.
    #[serde(rename = "Low")]
    pub low: f64,
    /// Price of the last trade in the bucket.
    #[serde(rename = "Close")]
    pub close: f64,
    /// Sum of trade sizes.
    #[serde(rename = "Volume")]
    pub volume: f64,
    /// Number of trades in the bucket.
    #[serde(skip)]
    pub trade_count: u32,
}

impl Bar {
    /// High minus low.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Open and close lie within `[low, high]`.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

mod bar_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::BAR_TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(BAR_TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, BAR_TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_tick_timestamp() {
        let ts = parse_tick_timestamp("2024-09-16 10:00:05.250000").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 9, 16)
            .unwrap()
            .and_hms_micro_opt(10, 0, 5, 250_000)
            .unwrap();
        assert_eq!(ts, expected);

        assert!(parse_tick_timestamp("16/09/2024 10:00").is_err());
        assert!(parse_tick_timestamp("").is_err());
    }

    #[test]
    fn test_parse_window_timestamp() {
        let ts = parse_window_timestamp(" 2024-09-16 10:01:00 ").unwrap();
        assert_eq!(ts.format(BAR_TIMESTAMP_FORMAT).to_string(), "2024-09-16 10:01:00");
        assert!(parse_window_timestamp("2024-09-16").is_err());
    }

    #[test]
    fn test_raw_record_lookup() {
        let record = RawRecord::from_pairs(&[
            ("Timestamp", "2024-09-16 10:00:00.000000"),
            ("Price", "450.5"),
            ("Size", "3"),
            ("Venue", "X"),
        ]);
        assert_eq!(record.price(), Some("450.5"));
        assert_eq!(record.size(), Some("3"));
        assert_eq!(record.get("Venue"), Some("X"));
        assert_eq!(record.get("Side"), None);
        assert_eq!(record.columns().len(), 4);
    }

    #[test]
    fn test_short_row_has_no_value() {
        let columns: Arc<[String]> = vec!["Timestamp".to_string(), "Price".to_string()].into();
        let record = RawRecord::new(columns, vec!["2024-09-16 10:00:00.000000".to_string()]);
        assert_eq!(record.price(), None);
    }

    #[test]
    fn test_clean_record_accessors() {
        let raw = RawRecord::from_pairs(&[
            ("Timestamp", "2024-09-16 10:00:00.000000"),
            ("Price", "450"),
            ("Size", " 2.5 "),
        ]);
        let record = CleanRecord::new(raw.clone(), 450.0);
        assert_eq!(record.price(), 450.0);
        assert_eq!(record.parse_size().unwrap(), 2.5);
        assert!(record.parse_timestamp().is_ok());
        assert_eq!(record.into_raw(), raw);
    }

    #[test]
    fn test_bad_size_is_data_error() {
        let raw = RawRecord::from_pairs(&[("Timestamp", "t"), ("Price", "450"), ("Size", "lots")]);
        let err = CleanRecord::new(raw, 450.0).parse_size().unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_reject_reason_labels() {
        assert_eq!(RejectReason::ALL.len(), 5);
        assert_eq!(RejectReason::OutlierPrice.to_string(), "outlier_price");
    }

    #[test]
    fn test_bar_consistency() {
        let bar = Bar {
            timestamp: parse_window_timestamp("2024-09-16 10:00:00").unwrap(),
            open: 450.0,
            high: 460.0,
            low: 445.0,
            close: 455.0,
            volume: 5.0,
            trade_count: 3,
        };
        assert!(bar.is_consistent());
        assert_eq!(bar.range(), 15.0);

        let broken = Bar { close: 470.0, ..bar };
        assert!(!broken.is_consistent());
    }
}
