//! Parallel batch loading.
//!
//! Every batch is read and cleaned on its own worker with its own
//! [`RecordCleaner`], so workers share nothing. Results are gathered in the
//! order the source listed the batches, not in completion order.
//!
//! There is no timeout: a read that hangs blocks its worker, and
//! [`BatchLoader::load_all`] waits for it.

use std::path::Path;

use rayon::prelude::*;
use tickbar_core::config::{CleaningConfig, Config};
use tickbar_core::{CleanRecord, Error, Result};

use crate::cleaner::{CleaningStats, RecordCleaner};
use crate::sink;
use crate::source::BatchSource;

/// A batch that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Batch identifier.
    pub batch: String,
    /// Error message.
    pub error: String,
}

/// Result of loading every batch.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Cleaned records, batch by batch in listing order.
    pub records: Vec<CleanRecord>,
    /// Cleaning statistics summed over all batches.
    pub stats: CleaningStats,
    /// Number of batches listed.
    pub batch_count: usize,
    /// Batches that contributed nothing because they could not be read.
    pub failed_batches: Vec<BatchFailure>,
}

impl LoadReport {
    /// True when no batch could be read.
    pub fn all_failed(&self) -> bool {
        self.batch_count > 0 && self.failed_batches.len() == self.batch_count
    }
}

/// Outcome of one worker task.
struct BatchOutcome {
    records: Vec<CleanRecord>,
    stats: CleaningStats,
    failure: Option<BatchFailure>,
}

/// Loads and cleans all batches of a source.
pub struct BatchLoader {
    cleaning: CleaningConfig,
    /// Worker threads (0 = one per core).
    workers: usize,
}

impl BatchLoader {
    /// Create a loader with the given price bounds and pool size.
    pub fn new(cleaning: CleaningConfig, workers: usize) -> Self {
        Self { cleaning, workers }
    }

    /// Create a loader from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cleaning.clone(), config.loader.workers)
    }

    /// Read and clean every batch of `source`.
    ///
    /// Fails only if the batches cannot be listed or the worker pool cannot
    /// be started. Unreadable batches are reported in
    /// [`LoadReport::failed_batches`] and contribute no records.
    pub fn load_all<S: BatchSource + ?Sized>(&self, source: &S) -> Result<LoadReport> {
        let batches = source.list_batches()?;
        tracing::info!(batches = batches.len(), workers = self.workers, "loading batches");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("tickbar-loader-{i}"))
            .build()
            .map_err(|e| Error::Other(format!("cannot start worker pool: {e}")))?;

        let outcomes: Vec<BatchOutcome> = pool.install(|| {
            batches
                .par_iter()
                .map(|batch| self.load_batch(source, batch))
                .collect()
        });

        let mut report = LoadReport {
            batch_count: batches.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            report.stats.merge(&outcome.stats);
            report.records.extend(outcome.records);
            if let Some(failure) = outcome.failure {
                report.failed_batches.push(failure);
            }
        }

        tracing::info!(
            rows = report.records.len(),
            rejected = report.stats.rejected(),
            failed_batches = report.failed_batches.len(),
            "loading complete"
        );
        Ok(report)
    }

    fn load_batch<S: BatchSource + ?Sized>(&self, source: &S, batch: &str) -> BatchOutcome {
        let _span = tracing::info_span!("batch", batch).entered();

        match source.read_batch(batch) {
            Ok(raw) => {
                let read = raw.len();
                let mut cleaner = RecordCleaner::from_config(&self.cleaning);
                let records = cleaner.clean(raw);
                tracing::info!(read, valid_rows = records.len(), "batch cleaned");
                BatchOutcome {
                    records,
                    stats: cleaner.stats().clone(),
                    failure: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "batch skipped");
                BatchOutcome {
                    records: Vec::new(),
                    stats: CleaningStats::default(),
                    failure: Some(BatchFailure {
                        batch: batch.to_string(),
                        error: e.to_string(),
                    }),
                }
            }
        }
    }

    /// Write the combined cleaned set to `destination`.
    pub fn save_all(&self, records: &[CleanRecord], destination: &Path) -> Result<usize> {
        sink::save_all(records, destination)
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CsvDirSource;
    use std::collections::BTreeMap;
    use tickbar_core::RawRecord;

    /// In-memory source; batches listed in key order.
    struct MemorySource {
        batches: BTreeMap<String, Option<Vec<RawRecord>>>,
    }

    impl MemorySource {
        fn new() -> Self {
            Self {
                batches: BTreeMap::new(),
            }
        }

        fn with_batch(mut self, name: &str, records: Vec<RawRecord>) -> Self {
            self.batches.insert(name.to_string(), Some(records));
            self
        }

        fn with_broken_batch(mut self, name: &str) -> Self {
            self.batches.insert(name.to_string(), None);
            self
        }
    }

    impl BatchSource for MemorySource {
        fn list_batches(&self) -> Result<Vec<String>> {
            Ok(self.batches.keys().cloned().collect())
        }

        fn read_batch(&self, batch: &str) -> Result<Vec<RawRecord>> {
            match self.batches.get(batch) {
                Some(Some(records)) => Ok(records.clone()),
                _ => Err(Error::batch_read(format!("{batch}: unreadable"))),
            }
        }
    }

    fn make_record(second: u32, price: &str) -> RawRecord {
        let ts = format!("2024-09-16 10:00:{second:02}.000000");
        RawRecord::from_pairs(&[
            ("Timestamp", ts.as_str()),
            ("Price", price),
            ("Size", "1"),
        ])
    }

    #[test]
    fn test_concatenates_in_listing_order() {
        let mut source = MemorySource::new();
        for b in 0..20u32 {
            // Later batches are smaller so they tend to finish first.
            let records = (0..(40 - b)).map(|s| make_record(s, &format!("{}", 400 + b))).collect();
            source = source.with_batch(&format!("batch_{b:02}.csv"), records);
        }

        let loader = BatchLoader::new(CleaningConfig::default(), 4);
        let report = loader.load_all(&source).unwrap();

        assert_eq!(report.batch_count, 20);
        let prices: Vec<f64> = report.records.iter().map(|r| r.price()).collect();
        let mut sorted = prices.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(prices, sorted);
        assert_eq!(report.records.len(), (21..=40).sum::<usize>());
    }

    #[test]
    fn test_dedup_is_per_batch() {
        let source = MemorySource::new()
            .with_batch("a.csv", vec![make_record(0, "450"), make_record(0, "451")])
            .with_batch("b.csv", vec![make_record(0, "452")]);

        let report = BatchLoader::default().load_all(&source).unwrap();

        let prices: Vec<f64> = report.records.iter().map(|r| r.price()).collect();
        assert_eq!(prices, vec![450.0, 452.0]);
        assert_eq!(report.stats.duplicate_timestamp, 1);
    }

    #[test]
    fn test_broken_batch_is_isolated() {
        let source = MemorySource::new()
            .with_batch("a.csv", vec![make_record(0, "450")])
            .with_broken_batch("b.csv")
            .with_batch("c.csv", vec![make_record(1, "460"), make_record(2, "9000")]);

        let report = BatchLoader::new(CleaningConfig::default(), 2).load_all(&source).unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].batch, "b.csv");
        assert_eq!(report.stats.outlier_price, 1);
        assert!(!report.all_failed());
    }

    #[test]
    fn test_empty_source() {
        let report = BatchLoader::default().load_all(&MemorySource::new()).unwrap();
        assert!(report.records.is_empty());
        assert!(!report.all_failed());
    }

    #[test]
    fn test_directory_with_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("1_good.csv"),
            "Timestamp,Price,Size\n2024-09-16 10:00:00.000000,450,2\n2024-09-16 10:00:01.000000,41.2,2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("2_bad.csv"), "garbage\n\u{1}\u{2}\n").unwrap();

        let source = CsvDirSource::new(dir.path());
        let report = BatchLoader::default().load_all(&source).unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].price(), 450.0);
        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].batch, "2_bad.csv");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvDirSource::new(dir.path().join("absent"));
        assert!(BatchLoader::default().load_all(&source).is_err());
    }

    #[test]
    fn test_save_all_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new().with_batch("a.csv", vec![make_record(0, "450"), make_record(1, "-2")]);
        let loader = BatchLoader::default();
        let report = loader.load_all(&source).unwrap();

        let out = dir.path().join("cleaned.csv");
        assert_eq!(loader.save_all(&report.records, &out).unwrap(), 1);
        let reloaded = crate::source::read_csv_records(&out).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].price(), Some("450"));
    }
}
