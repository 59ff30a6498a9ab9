//! CSV output for cleaned records and bars.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tickbar_core::{Bar, CleanRecord, Error, Result};

/// Name of the combined cleaned file for a run started at `now`.
pub fn cleaned_file_name(now: NaiveDateTime) -> String {
    format!("cleaned_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Name of the bar file for one aggregation run.
pub fn bars_file_name(start: NaiveDateTime, end: NaiveDateTime, interval: &str) -> String {
    format!(
        "ohlcv_{}_to_{}_{}.csv",
        start.format("%Y%m%d_%H%M%S"),
        end.format("%Y%m%d_%H%M%S"),
        interval
    )
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| Error::output_write(format!("cannot create {}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

/// Write cleaned records to `destination` with a single header row.
///
/// The header is the first record's columns. Records from batches with a
/// different layout are written by column name; columns they lack are left
/// empty. Returns the number of rows written.
pub fn save_all(records: &[CleanRecord], destination: &Path) -> Result<usize> {
    let first = records
        .first()
        .ok_or_else(|| Error::empty_dataset("no cleaned records to write"))?;
    ensure_parent(destination)?;

    let write_err = |e: csv::Error| Error::output_write(format!("{}: {e}", destination.display()));
    let header = first.raw().columns_arc();

    let mut writer = csv::Writer::from_path(destination).map_err(write_err)?;
    writer.write_record(header.iter()).map_err(write_err)?;

    for record in records {
        let raw = record.raw();
        if Arc::ptr_eq(raw.columns_arc(), header) || raw.columns() == &header[..] {
            writer.write_record(raw.values()).map_err(write_err)?;
        } else {
            writer
                .write_record(header.iter().map(|c| raw.get(c).unwrap_or_default()))
                .map_err(write_err)?;
        }
    }
    writer
        .flush()
        .map_err(|e| Error::output_write(format!("{}: {e}", destination.display())))?;

    tracing::info!(path = %destination.display(), rows = records.len(), "cleaned data written");
    Ok(records.len())
}

/// Write bars to `destination` as `Timestamp,Open,High,Low,Close,Volume`.
pub fn write_bars(bars: &[Bar], destination: &Path) -> Result<usize> {
    if bars.is_empty() {
        return Err(Error::empty_dataset("no bars to write"));
    }
    ensure_parent(destination)?;

    let write_err = |e: csv::Error| Error::output_write(format!("{}: {e}", destination.display()));
    let mut writer = csv::Writer::from_path(destination).map_err(write_err)?;
    for bar in bars {
        writer.serialize(bar).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| Error::output_write(format!("{}: {e}", destination.display())))?;

    tracing::info!(path = %destination.display(), bars = bars.len(), "OHLCV data written");
    Ok(bars.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickbar_core::{parse_window_timestamp, RawRecord};

    fn clean(pairs: &[(&str, &str)], price: f64) -> CleanRecord {
        CleanRecord::new(RawRecord::from_pairs(pairs), price)
    }

    #[test]
    fn test_file_names() {
        let start = parse_window_timestamp("2024-09-16 10:00:00").unwrap();
        let end = parse_window_timestamp("2024-09-16 10:01:00").unwrap();
        assert_eq!(
            bars_file_name(start, end, "15s"),
            "ohlcv_20240916_100000_to_20240916_100100_15s.csv"
        );
        assert_eq!(cleaned_file_name(start), "cleaned_data_20240916_100000.csv");
    }

    #[test]
    fn test_save_all_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("cleaned.csv");
        let records = vec![
            clean(&[("Timestamp", "t1"), ("Price", "450"), ("Size", "1")], 450.0),
            clean(&[("Timestamp", "t2"), ("Price", "451"), ("Size", "2")], 451.0),
            // Different layout: extra column dropped, order follows the header.
            clean(&[("Size", "3"), ("Price", "452"), ("Timestamp", "t3"), ("X", "y")], 452.0),
        ];

        assert_eq!(save_all(&records, &path).unwrap(), 3);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Timestamp,Price,Size\nt1,450,1\nt2,451,2\nt3,452,3\n");
    }

    #[test]
    fn test_save_all_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_all(&[], &dir.path().join("x.csv")).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
        assert!(!dir.path().join("x.csv").exists());
    }

    #[test]
    fn test_save_all_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let records = vec![clean(&[("Timestamp", "t"), ("Price", "450"), ("Size", "1")], 450.0)];

        let err = save_all(&records, &blocker.join("cleaned.csv")).unwrap_err();
        assert!(matches!(err, Error::OutputWrite(_)));
    }

    #[test]
    fn test_write_bars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        let bars = vec![Bar {
            timestamp: parse_window_timestamp("2024-09-16 10:00:10").unwrap(),
            open: 440.0,
            high: 440.0,
            low: 440.0,
            close: 440.0,
            volume: 1.5,
            trade_count: 1,
        }];

        assert_eq!(write_bars(&bars, &path).unwrap(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Timestamp,Open,High,Low,Close,Volume\n2024-09-16 10:00:10,440.0,440.0,440.0,440.0,1.5\n"
        );
        assert!(matches!(write_bars(&[], &path), Err(Error::EmptyDataset(_))));
    }
}
