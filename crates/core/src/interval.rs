//! Compact interval strings such as `"15s"`, `"1h"` or `"1d2h30m"`.
//!
//! Grammar: one or more `<digits><unit>` pairs with `unit` one of
//! `d`, `h`, `m`, `s`. A unit given twice keeps the last value; unit order is
//! not checked.

use std::fmt;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// A duration made of day/hour/minute/second components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Interval {
    /// Parse a compact interval string.
    ///
    /// Fails with [`Error::InvalidIntervalFormat`] when a unit letter has no
    /// digits in front of it, when any other character shows up, or when the
    /// string ends in digits without a unit. Magnitudes are not bounded apart
    /// from having to fit in a `u64`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut interval = Interval::default();
        let mut digits = String::new();

        for ch in s.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }

            let slot = match ch {
                'd' => &mut interval.days,
                'h' => &mut interval.hours,
                'm' => &mut interval.minutes,
                's' => &mut interval.seconds,
                _ => {
                    return Err(Error::invalid_interval(format!(
                        "invalid character '{ch}' in interval: {s}"
                    )))
                }
            };

            if digits.is_empty() {
                return Err(Error::invalid_interval(format!(
                    "unit '{ch}' without a value in interval: {s}"
                )));
            }

            *slot = digits
                .parse()
                .map_err(|_| Error::invalid_interval(format!("value out of range in interval: {s}")))?;
            digits.clear();
        }

        if !digits.is_empty() {
            return Err(Error::invalid_interval(format!(
                "trailing digits without a unit in interval: {s}"
            )));
        }

        tracing::debug!(interval = s, parsed = %interval, "parsed interval");
        Ok(interval)
    }

    /// Total length in seconds, or `None` if it does not fit in a `u64`.
    pub fn total_seconds(&self) -> Option<u64> {
        self.days
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(self.hours.checked_mul(SECONDS_PER_HOUR)?)?
            .checked_add(self.minutes.checked_mul(SECONDS_PER_MINUTE)?)?
            .checked_add(self.seconds)
    }

    /// True when every component is zero.
    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Convert to a `chrono` time delta, or `None` if it is too large.
    pub fn to_time_delta(&self) -> Option<TimeDelta> {
        let secs = i64::try_from(self.total_seconds()?).ok()?;
        TimeDelta::try_seconds(secs)
    }
}

impl std::str::FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Interval::parse(s)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0s");
        }
        for (value, unit) in [
            (self.days, 'd'),
            (self.hours, 'h'),
            (self.minutes, 'm'),
            (self.seconds, 's'),
        ] {
            if value > 0 {
                write!(f, "{value}{unit}")?;
            }
        }
        Ok(())
    }
}
