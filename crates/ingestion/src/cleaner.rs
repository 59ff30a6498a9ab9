//! Record validation and deduplication.
//!
//! Each record goes through a fixed sequence of checks and is dropped on the
//! first one it fails:
//!
//! 1. `Price` or `Size` empty/absent
//! 2. `Price` not a finite number
//! 3. `Price` not strictly positive
//! 4. `Price` outside `[min_valid_price, max_valid_price]`
//! 5. `Timestamp` already accepted earlier in the same call
//!
//! Deduplication is scoped to a single [`RecordCleaner::clean`] call. The
//! batch loader cleans each file separately, so equal timestamps in two
//! different files are both kept.

use std::collections::HashSet;

use tickbar_core::config::CleaningConfig;
use tickbar_core::{CleanRecord, RawRecord, RejectReason};

/// Counts of accepted and rejected records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningStats {
    /// Total records inspected.
    pub total_records: u64,
    /// Records that passed every check.
    pub accepted: u64,
    /// Rejected for an empty or absent `Price`/`Size`.
    pub missing_field: u64,
    /// Rejected for an unparseable `Price`.
    pub numeric_conversion: u64,
    /// Rejected for a price at or below zero.
    pub non_positive_price: u64,
    /// Rejected for a price outside the configured bounds.
    pub outlier_price: u64,
    /// Rejected for a timestamp seen earlier in the batch.
    pub duplicate_timestamp: u64,
}

impl CleaningStats {
    /// Count one rejection.
    pub fn record_rejection(&mut self, reason: RejectReason) {
        *self.slot_mut(reason) += 1;
    }

    /// Number of rejections for one reason.
    pub fn count(&self, reason: RejectReason) -> u64 {
        match reason {
            RejectReason::MissingField => self.missing_field,
            RejectReason::NumericConversion => self.numeric_conversion,
            RejectReason::NonPositivePrice => self.non_positive_price,
            RejectReason::OutlierPrice => self.outlier_price,
            RejectReason::DuplicateTimestamp => self.duplicate_timestamp,
        }
    }

    /// Total rejections across all reasons.
    pub fn rejected(&self) -> u64 {
        RejectReason::ALL.iter().map(|&r| self.count(r)).sum()
    }

    /// Fraction of inspected records that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_records > 0 {
            self.accepted as f64 / self.total_records as f64
        } else {
            0.0
        }
    }

    /// Add another set of counts into this one.
    pub fn merge(&mut self, other: &CleaningStats) {
        self.total_records += other.total_records;
        self.accepted += other.accepted;
        for reason in RejectReason::ALL {
            *self.slot_mut(reason) += other.count(reason);
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn slot_mut(&mut self, reason: RejectReason) -> &mut u64 {
        match reason {
            RejectReason::MissingField => &mut self.missing_field,
            RejectReason::NumericConversion => &mut self.numeric_conversion,
            RejectReason::NonPositivePrice => &mut self.non_positive_price,
            RejectReason::OutlierPrice => &mut self.outlier_price,
            RejectReason::DuplicateTimestamp => &mut self.duplicate_timestamp,
        }
    }
}

/// Validates and deduplicates batches of raw records.
pub struct RecordCleaner {
    /// Lowest accepted price (inclusive).
    min_valid_price: f64,
    /// Highest accepted price (inclusive).
    max_valid_price: f64,
    /// Statistics accumulated over every `clean` call.
    stats: CleaningStats,
}

impl RecordCleaner {
    /// Create a cleaner with the given price bounds.
    pub fn new(min_valid_price: f64, max_valid_price: f64) -> Self {
        Self {
            min_valid_price,
            max_valid_price,
            stats: CleaningStats::default(),
        }
    }

    /// Create a cleaner from configuration.
    pub fn from_config(config: &CleaningConfig) -> Self {
        Self::new(config.min_valid_price, config.max_valid_price)
    }

    /// Run the first four checks, returning the parsed price.
    fn validate(&self, record: &RawRecord) -> Result<f64, RejectReason> {
        let price = match (record.price(), record.size()) {
            (Some(price), Some(size)) if !price.is_empty() && !size.is_empty() => price,
            _ => return Err(RejectReason::MissingField),
        };

        let price: f64 = match price.trim().parse::<f64>() {
            Ok(p) if p.is_finite() => p,
            _ => return Err(RejectReason::NumericConversion),
        };

        if price <= 0.0 {
            return Err(RejectReason::NonPositivePrice);
        }

        if price < self.min_valid_price || price > self.max_valid_price {
            return Err(RejectReason::OutlierPrice);
        }

        Ok(price)
    }

    /// Clean one batch, keeping the input order of accepted records.
    pub fn clean(&mut self, records: Vec<RawRecord>) -> Vec<CleanRecord> {
        let mut seen_timestamps: HashSet<String> = HashSet::with_capacity(records.len());
        let mut cleaned = Vec::with_capacity(records.len());

        for record in records {
            self.stats.total_records += 1;

            let outcome = self.validate(&record).and_then(|price| {
                let ts = record.timestamp().unwrap_or_default();
                if seen_timestamps.contains(ts) {
                    Err(RejectReason::DuplicateTimestamp)
                } else {
                    seen_timestamps.insert(ts.to_string());
                    Ok(price)
                }
            });

            match outcome {
                Ok(price) => {
                    self.stats.accepted += 1;
                    cleaned.push(CleanRecord::new(record, price));
                }
                Err(reason) => {
                    tracing::debug!(
                        reason = %reason,
                        timestamp = record.timestamp().unwrap_or_default(),
                        price = record.price().unwrap_or_default(),
                        size = record.size().unwrap_or_default(),
                        "record removed"
                    );
                    self.stats.record_rejection(reason);
                }
            }
        }

        tracing::debug!(valid_rows = cleaned.len(), "cleaning pass complete");
        cleaned
    }

    /// Get cleaning statistics.
    pub fn stats(&self) -> &CleaningStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

impl Default for RecordCleaner {
    fn default() -> Self {
        Self::from_config(&CleaningConfig::default())
    }
}
