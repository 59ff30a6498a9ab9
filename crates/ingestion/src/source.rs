//! Batch discovery and reading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tickbar_core::{Error, RawRecord, Result, REQUIRED_FIELDS};

/// Somewhere input batches come from.
///
/// Implementations must be shareable across the loader's worker threads.
pub trait BatchSource: Sync {
    /// Batch identifiers in the order their records should be concatenated.
    fn list_batches(&self) -> Result<Vec<String>>;

    /// Read every raw record of one batch.
    fn read_batch(&self, batch: &str) -> Result<Vec<RawRecord>>;
}

/// A directory of CSV files, one batch per file.
pub struct CsvDirSource {
    dir: PathBuf,
    extension: String,
}

impl CsvDirSource {
    /// Files ending in `.csv` inside `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_extension(dir, "csv")
    }

    /// Files ending in `.<extension>` inside `dir`.
    pub fn with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BatchSource for CsvDirSource {
    /// Regular files with the configured extension, sorted by file name.
    fn list_batches(&self) -> Result<Vec<String>> {
        let suffix = format!(".{}", self.extension);
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::data(format!("cannot list {}: {e}", self.dir.display())))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if name.ends_with(&suffix) && entry.path().is_file() {
                names.push(name);
            }
        }
        names.sort();

        tracing::debug!(dir = %self.dir.display(), batches = names.len(), "listed batches");
        Ok(names)
    }

    fn read_batch(&self, batch: &str) -> Result<Vec<RawRecord>> {
        read_csv_records(self.dir.join(batch))
    }
}

/// Read a CSV file with a header row into raw records.
///
/// Short rows are kept; their trailing columns read as absent. A file whose
/// header lacks any of `Timestamp`, `Price` or `Size` is rejected.
pub fn read_csv_records<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let batch_err = |e: &dyn std::fmt::Display| Error::batch_read(format!("{}: {e}", path.display()));

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| batch_err(&e))?;

    let columns: Arc<[String]> = reader
        .headers()
        .map_err(|e| batch_err(&e))?
        .iter()
        .map(str::to_string)
        .collect();

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !columns.iter().any(|c| c == field))
        .collect();
    if !missing.is_empty() {
        return Err(batch_err(&format!("missing columns {missing:?}")));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| batch_err(&e))?;
        let values = row.iter().map(str::to_string).collect();
        records.push(RawRecord::new(Arc::clone(&columns), values));
    }

    Ok(records)
}
