//! Local calendar arithmetic.
//!
//! All timestamps are stored in UTC. Day boundaries, hours of day and week
//! starts are evaluated in a fixed local offset so that "today" means the
//! user's today.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, Offset, Timelike, Utc};

/// Converts instants into local calendar terms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calendar evaluated in UTC
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Calendar for the machine's current local offset
    pub fn system_local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Calendar for an offset given in minutes east of UTC
    ///
    /// Returns `None` for offsets outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar day of an instant
    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Local hour (0-23) of an instant
    pub fn hour_of(&self, ts: DateTime<Utc>) -> u32 {
        ts.with_timezone(&self.offset).hour()
    }

    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    /// Monday of the week containing `day`
    pub fn week_start(day: NaiveDate) -> NaiveDate {
        day - Duration::days(day.weekday().num_days_from_monday() as i64)
    }

    /// Monday of the local week containing an instant
    pub fn week_start_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        Self::week_start(self.day_of(ts))
    }

    /// Whether an instant falls in the same local week as `now`
    pub fn in_week_of(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let start = self.week_start_of(now);
        let day = self.day_of(ts);
        day >= start && day < start + Duration::days(7)
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}
