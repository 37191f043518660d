//! Day buckets
//!
//! Dependency batches and the service/span index are partitioned by UTC day.
//! A query over `[end - lookback, end]` becomes a list of [`DayKey`]s, one per
//! calendar day touched by the window, both boundary days included.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds in one UTC day
pub const DAY_MILLIS: i64 = 86_400_000;

/// Longest accepted query window, in days
pub const MAX_WINDOW_DAYS: i64 = 3_660;

/// Longest accepted lookback, in milliseconds
pub const MAX_LOOKBACK_MS: i64 = MAX_WINDOW_DAYS * DAY_MILLIS;

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A UTC calendar day, used as a partition key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Wrap a calendar date
    pub const fn new(date: NaiveDate) -> Self {
        DayKey(date)
    }

    /// Day number `n` counted from 1970-01-01
    ///
    /// Returns `None` outside chrono's representable range.
    pub fn from_epoch_day(day: i64) -> Option<Self> {
        let day = i32::try_from(day).ok()?;
        let from_ce = day.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?;
        NaiveDate::from_num_days_from_ce_opt(from_ce).map(DayKey)
    }

    /// The day containing an epoch-millisecond timestamp
    pub fn containing(ts_millis: i64) -> Option<Self> {
        Self::from_epoch_day(ts_millis.div_euclid(DAY_MILLIS))
    }

    /// The day containing an epoch-microsecond timestamp
    pub fn containing_micros(ts_micros: i64) -> Option<Self> {
        Self::containing(ts_micros.div_euclid(1_000))
    }

    /// Days since 1970-01-01
    pub fn epoch_day(&self) -> i64 {
        i64::from(self.0.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Midnight of this day in epoch milliseconds
    pub fn midnight_millis(&self) -> i64 {
        self.epoch_day() * DAY_MILLIS
    }

    /// The calendar date
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Last day chrono can represent, as days since 1970-01-01
    pub fn max_epoch_day() -> i64 {
        i64::from(NaiveDate::MAX.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Every day touched by `[end_ts - lookback, end_ts]`, ascending
    ///
    /// Timestamps are epoch milliseconds. `lookback = None` reaches back to
    /// the epoch; a window starting before the epoch is clamped to it.
    /// Days past chrono's range are dropped without being enumerated.
    /// A negative `end_ts` yields no days.
    pub fn window(end_ts: i64, lookback: Option<i64>) -> Vec<DayKey> {
        if end_ts < 0 {
            return Vec::new();
        }
        let start_ts = match lookback {
            Some(lookback) => end_ts.saturating_sub(lookback.max(0)).max(0),
            None => 0,
        };

        let first = start_ts.div_euclid(DAY_MILLIS);
        let last = end_ts.div_euclid(DAY_MILLIS).min(Self::max_epoch_day());
        (first..=last).filter_map(DayKey::from_epoch_day).collect()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        DayKey(date)
    }
}
