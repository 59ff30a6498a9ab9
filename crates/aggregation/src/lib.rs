//! OHLCV aggregation for the tickbar pipeline.
//!
//! Turns cleaned tick records into fixed-width bars over a time window.

pub mod ohlcv;

pub use ohlcv::OhlcvAggregator;
