//! Consecutive-day streaks over the activity history.
//!
//! Pure functions: callers normalize activity timestamps to local days with
//! [`activity_days`] and pass the set in.

use crate::{ActivityEvent, Calendar};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

/// Default number of days walked back for the current streak
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Local calendar days that contain at least one activity
pub fn activity_days(activities: &[ActivityEvent], calendar: &Calendar) -> BTreeSet<NaiveDate> {
    activities
        .iter()
        .map(|a| calendar.day_of(a.timestamp))
        .collect()
}

/// Compute the current and longest streak as of a given day
///
/// `current` counts consecutive active days ending on `as_of`, or on the day
/// before when `as_of` has no activity yet. The walk stops at the first gap or
/// after `lookback` days. `longest` is the longest run anywhere in `days` and
/// is never less than `current`. Days after `as_of` are ignored.
pub fn compute_streak(days: &BTreeSet<NaiveDate>, as_of: NaiveDate, lookback: u32) -> Streak {
    let mut cursor = as_of;
    if !days.contains(&cursor) {
        cursor -= Duration::days(1);
    }

    let mut current = 0u32;
    while current < lookback && days.contains(&cursor) {
        current += 1;
        cursor -= Duration::days(1);
    }

    let longest = longest_run(days.range(..=as_of)).max(current);

    Streak { current, longest }
}

fn longest_run<'a>(days: impl Iterator<Item = &'a NaiveDate>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}
