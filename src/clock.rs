//! Bar clock
//!
//! Every downstream stage keys off the boundary returned here, so no stage
//! ever sees a candle that could still be forming.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle timeframe in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeframe(u32);

impl Timeframe {
    pub const FOUR_HOURS: Timeframe = Timeframe(4);

    /// Create a timeframe; zero hours is rejected
    pub fn from_hours(hours: u32) -> Option<Self> {
        (hours > 0).then_some(Self(hours))
    }

    pub fn hours(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::hours(i64::from(self.0))
    }

    pub fn as_millis(&self) -> i64 {
        i64::from(self.0) * 3_600_000
    }

    /// Exchange interval string (`4h`, `1d`)
    pub fn interval(&self) -> String {
        if self.0 % 24 == 0 {
            format!("{}d", self.0 / 24)
        } else {
            format!("{}h", self.0)
        }
    }

    /// Start of the bar containing `ts`, aligned to the UNIX epoch
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let ms = ts.timestamp_millis();
        let floored = ms - ms.rem_euclid(self.as_millis());
        Utc.timestamp_millis_opt(floored)
            .single()
            .unwrap_or(ts)
    }

    /// Whether `ts` sits exactly on a bar boundary
    pub fn is_aligned(&self, ts: DateTime<Utc>) -> bool {
        ts.timestamp_millis().rem_euclid(self.as_millis()) == 0
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

/// Open time of the most recently *closed* bar: `floor(now, H) - H`.
///
/// The bar at the returned open time closes at `floor(now, H)`, which is never
/// later than `now`.
pub fn last_closed_bar(now: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    timeframe.floor(now) - timeframe.duration()
}
