//! Configuration structures for the tickbar pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for the pipeline.
///
/// Every section has defaults, so a JSON file only needs the keys it wants to
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record validation configuration.
    pub cleaning: CleaningConfig,
    /// Batch discovery and worker pool configuration.
    pub loader: LoaderConfig,
    /// Bar aggregation configuration.
    pub aggregation: AggregationConfig,
    /// Output locations.
    pub output: OutputConfig,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.cleaning.validate()?;
        if self.loader.extension.trim_start_matches('.').is_empty() {
            return Err(Error::config("loader.extension must not be empty"));
        }
        Ok(())
    }
}

/// Price bounds applied by the record cleaner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Lowest accepted price (inclusive).
    pub min_valid_price: f64,
    /// Highest accepted price (inclusive).
    pub max_valid_price: f64,
}

impl CleaningConfig {
    /// Bounds must be finite and ordered.
    pub fn validate(&self) -> Result<()> {
        if !self.min_valid_price.is_finite() || !self.max_valid_price.is_finite() {
            return Err(Error::config("price bounds must be finite"));
        }
        if self.min_valid_price > self.max_valid_price {
            return Err(Error::config(format!(
                "min_valid_price {} is above max_valid_price {}",
                self.min_valid_price, self.max_valid_price
            )));
        }
        Ok(())
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_valid_price: 400.0,
            max_valid_price: 500.0,
        }
    }
}

/// Batch loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// File extension of input batches, without the dot.
    pub extension: String,
    /// Number of parallel workers (0 = auto).
    pub workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: "csv".to_string(),
            workers: 0,
        }
    }
}

/// Bar aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Sort records by timestamp before bucketing. When false, input must
    /// already be in timestamp order.
    pub sort_by_timestamp: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            sort_by_timestamp: true,
        }
    }
}

/// Output directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the combined cleaned CSV goes.
    pub cleaned_dir: PathBuf,
    /// Where bar CSVs go.
    pub ohlcv_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cleaned_dir: PathBuf::from("data/cleaned"),
            ohlcv_dir: PathBuf::from("data/ohlcv"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig::default(),
            loader: LoaderConfig::default(),
            aggregation: AggregationConfig::default(),
            output: OutputConfig::default(),
            log_level: "info".to_string(),
        }
    }
}
