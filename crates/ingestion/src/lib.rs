//! Data ingestion and cleaning for the tickbar pipeline.
//!
//! This crate handles:
//! - Record validation and per-batch timestamp deduplication
//! - Batch discovery and CSV reading
//! - Parallel load + clean with ordered fan-in
//! - Writing cleaned records and bars back out as CSV

pub mod cleaner;
pub mod loader;
pub mod sink;
pub mod source;

pub use cleaner::{CleaningStats, RecordCleaner};
pub use loader::{BatchFailure, BatchLoader, LoadReport};
pub use sink::{bars_file_name, cleaned_file_name, save_all, write_bars};
pub use source::{BatchSource, CsvDirSource};
