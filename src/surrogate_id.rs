//! Surrogate id arithmetic.
//!
//! Resource surrogate ids are ordered by last-updated time: the id of an
//! instant is its tick count (100ns units since 0001-01-01T00:00:00Z),
//! truncated to the millisecond and shifted left by [`SHIFT_FACTOR`] bits so
//! resources written within the same millisecond still get distinct ids.

use chrono::{DateTime, TimeZone, Utc};

/// Low bits reserved for disambiguating ids within one millisecond.
pub const SHIFT_FACTOR: u32 = 3;

const TICKS_PER_MILLISECOND: i64 = 10_000;
const MILLIS_FROM_YEAR_ONE_TO_UNIX_EPOCH: i64 = 62_135_596_800_000;

/// Lowest possible surrogate id.
pub const MIN_SURROGATE_ID: i64 = 0;

/// Surrogate id of the first resource written at `instant`.
pub fn from_datetime(instant: DateTime<Utc>) -> i64 {
    let ticks = (instant.timestamp_millis() + MILLIS_FROM_YEAR_ONE_TO_UNIX_EPOCH)
        .saturating_mul(TICKS_PER_MILLISECOND);
    ticks.saturating_mul(1 << SHIFT_FACTOR).max(MIN_SURROGATE_ID)
}

/// Instant (millisecond precision) at which `surrogate_id` was assigned.
pub fn to_datetime(surrogate_id: i64) -> Option<DateTime<Utc>> {
    let millis = (surrogate_id >> SHIFT_FACTOR) / TICKS_PER_MILLISECOND
        - MILLIS_FROM_YEAR_ONE_TO_UNIX_EPOCH;
    Utc.timestamp_millis_opt(millis).single()
}

/// Inclusive surrogate id bounds of one resource-type scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBounds {
    pub start: i64,
    pub end: i64,
}

impl ScanBounds {
    /// Everything written strictly before `created_at`.
    ///
    /// Resources created after the job started are outside the scan.
    pub fn before(created_at: DateTime<Utc>) -> Self {
        Self {
            start: MIN_SURROGATE_ID,
            end: from_datetime(created_at) - 1,
        }
    }

    pub fn contains(&self, surrogate_id: i64) -> bool {
        self.start <= surrogate_id && surrogate_id <= self.end
    }
}
