//! Store timestamps.
//!
//! The store stamps posts and comments with nanoseconds since the Unix epoch.
//! Every conversion to a calendar date goes through [`Timestamp`] so that the
//! unit is fixed in one place: mixing it up with milliseconds or seconds would
//! render plausible-looking but wrong dates without failing anything.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A store-assigned instant, in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(NANOS_PER_SEC))
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Utc::now()
            .timestamp_nanos_opt()
            .map_or(Self(i64::MAX), Self)
    }

    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0 / NANOS_PER_MILLI
    }

    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }

    /// Long date for post listings, e.g. `November 14, 2023`.
    #[must_use]
    pub fn format_date(self) -> String {
        self.to_datetime().format("%B %-d, %Y").to_string()
    }

    /// Long date and time for post details and comments, e.g.
    /// `November 14, 2023 at 10:13 PM`. Rendered in UTC.
    #[must_use]
    pub fn format_date_time(self) -> String {
        self.to_datetime()
            .format("%B %-d, %Y at %-I:%M %p")
            .to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
