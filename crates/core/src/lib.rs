//! Core types and configuration for the tickbar pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Tick records (raw and cleaned) and OHLCV bars
//! - The compact interval grammar used for bar widths
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod interval;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use interval::Interval;
pub use types::*;
