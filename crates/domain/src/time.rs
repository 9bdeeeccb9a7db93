//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for state-change bookkeeping.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Seconds since the Unix epoch, clamped at zero for pre-epoch clocks.
#[must_use]
pub fn unix_seconds() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
