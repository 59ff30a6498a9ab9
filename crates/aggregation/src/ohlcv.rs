//! Window filtering and fixed-width bucketing of cleaned records.
//!
//! Buckets are half-open, `[start + k * interval, start + (k + 1) * interval)`,
//! and the walk stops once a bucket would start at or after the window end.
//! The last bucket keeps its full width even if it reaches past the end; the
//! window filter already dropped anything at or after the end.

use chrono::{NaiveDateTime, TimeDelta};
use ordered_float::OrderedFloat;
use tickbar_core::config::AggregationConfig;
use tickbar_core::{Bar, CleanRecord, Error, Interval, Result};

/// A record paired with its parsed timestamp.
#[derive(Debug, Clone, Copy)]
struct TimedRecord<'a> {
    ts: NaiveDateTime,
    record: &'a CleanRecord,
}

/// Builds OHLCV bars from cleaned records.
#[derive(Debug, Clone)]
pub struct OhlcvAggregator {
    /// Sort by timestamp before bucketing. Without it the input must already
    /// be in timestamp order: the walk only moves forward, and a record older
    /// than the current bucket stops it.
    sort_by_timestamp: bool,
}

impl OhlcvAggregator {
    /// Create an aggregator.
    pub fn new(sort_by_timestamp: bool) -> Self {
        Self { sort_by_timestamp }
    }

    /// Create an aggregator from configuration.
    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(config.sort_by_timestamp)
    }

    /// Aggregate `records` inside `[start, end)` into bars of width `interval`.
    ///
    /// The interval string is parsed before anything else; a malformed or
    /// zero-length interval fails the whole call. So does any record whose
    /// timestamp does not parse, or an in-window record whose size does not.
    pub fn aggregate(
        &self,
        records: &[CleanRecord],
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: &str,
    ) -> Result<Vec<Bar>> {
        let interval = Interval::parse(interval)?;
        self.aggregate_interval(records, start, end, interval)
    }

    /// Same as [`aggregate`](Self::aggregate) with an already parsed interval.
    pub fn aggregate_interval(
        &self,
        records: &[CleanRecord],
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: Interval,
    ) -> Result<Vec<Bar>> {
        let width = bucket_width(interval)?;

        let mut timed = filter_window(records, start, end)?;
        if self.sort_by_timestamp {
            timed.sort_by_key(|t| t.ts);
        }

        let bars = walk_buckets(&timed, start, end, width)?;
        tracing::info!(bars = bars.len(), interval = %interval, "OHLCV calculation complete");
        Ok(bars)
    }

    /// Records inside `[start, end)`, in input order.
    pub fn filter_by_window<'a>(
        &self,
        records: &'a [CleanRecord],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<&'a CleanRecord>> {
        Ok(filter_window(records, start, end)?
            .into_iter()
            .map(|t| t.record)
            .collect())
    }
}

impl Default for OhlcvAggregator {
    fn default() -> Self {
        Self::from_config(&AggregationConfig::default())
    }
}

fn bucket_width(interval: Interval) -> Result<TimeDelta> {
    if interval.is_zero() {
        return Err(Error::invalid_interval(format!(
            "interval {interval} must be greater than zero"
        )));
    }
    interval
        .to_time_delta()
        .ok_or_else(|| Error::invalid_interval(format!("interval {interval} is too large")))
}

fn filter_window(
    records: &[CleanRecord],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<TimedRecord<'_>>> {
    let mut timed = Vec::new();
    for record in records {
        let ts = record.parse_timestamp()?;
        if start <= ts && ts < end {
            timed.push(TimedRecord { ts, record });
        }
    }

    tracing::info!(%start, %end, rows = timed.len(), "filtered records to window");
    Ok(timed)
}

/// Walk buckets from `start` with an index cursor over `timed`.
fn walk_buckets(
    timed: &[TimedRecord<'_>],
    start: NaiveDateTime,
    end: NaiveDateTime,
    width: TimeDelta,
) -> Result<Vec<Bar>> {
    let mut bars = Vec::new();
    let mut cursor = 0usize;
    let mut bucket_start = start;

    while bucket_start < end {
        let Some(next) = timed.get(cursor) else {
            break;
        };
        if next.ts < bucket_start {
            // Out-of-order input; nothing after this point can be placed.
            tracing::warn!(
                dropped = timed.len() - cursor,
                at = %next.ts,
                bucket = %bucket_start,
                "records out of timestamp order were not bucketed"
            );
            break;
        }

        // Jump over empty buckets straight to the one holding the next record.
        let gap = skip_whole_buckets(next.ts - bucket_start, width);
        bucket_start = match bucket_start.checked_add_signed(gap) {
            Some(ts) => ts,
            None => break,
        };
        if bucket_start >= end {
            break;
        }

        // `None` means the bucket end is beyond the representable range.
        let bucket_end = bucket_start.checked_add_signed(width);
        let first = cursor;
        while let Some(t) = timed.get(cursor) {
            let in_bucket = t.ts >= bucket_start && bucket_end.map_or(true, |e| t.ts < e);
            if !in_bucket {
                break;
            }
            cursor += 1;
        }

        if cursor > first {
            let bar = build_bar(bucket_start, &timed[first..cursor])?;
            tracing::debug!(bucket = %bucket_start, trades = bar.trade_count, "bar built");
            bars.push(bar);
        }

        match bucket_end {
            Some(e) => bucket_start = e,
            None => break,
        }
    }

    Ok(bars)
}

/// Largest whole multiple of `width` not exceeding `gap`.
fn skip_whole_buckets(gap: TimeDelta, width: TimeDelta) -> TimeDelta {
    let (Some(gap_ns), Some(width_ns)) = (gap.num_nanoseconds(), width.num_nanoseconds()) else {
        // Too wide for nanosecond arithmetic; fall back to whole seconds.
        let k = gap.num_seconds() / width.num_seconds().max(1);
        return TimeDelta::try_seconds(k * width.num_seconds()).unwrap_or(TimeDelta::zero());
    };
    TimeDelta::nanoseconds((gap_ns / width_ns) * width_ns)
}

fn build_bar(bucket_start: NaiveDateTime, trades: &[TimedRecord<'_>]) -> Result<Bar> {
    let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
        return Err(Error::data("cannot build a bar from an empty bucket"));
    };

    let prices = || trades.iter().map(|t| OrderedFloat(t.record.price()));
    let high = prices().max().map_or(first.record.price(), |p| p.0);
    let low = prices().min().map_or(first.record.price(), |p| p.0);

    let mut volume = 0.0;
    for t in trades {
        volume += t.record.parse_size()?;
    }

    Ok(Bar {
        timestamp: bucket_start,
        open: first.record.price(),
        high,
        low,
        close: last.record.price(),
        volume,
        trade_count: u32::try_from(trades.len()).unwrap_or(u32::MAX),
    })
}
