use std::time::Duration;

use time::OffsetDateTime;

use crate::db::models::TestLimit;

/// Session deadline: the longest time limit among the session's tests, or
/// `default_minutes` when none of them sets one.
pub(crate) fn deadline_minutes(limits: &[TestLimit], default_minutes: u32) -> u32 {
    limits
        .iter()
        .filter_map(|limit| limit.time_limit_minutes)
        .filter(|minutes| *minutes > 0)
        .max()
        .map(|minutes| minutes as u32)
        .unwrap_or(default_minutes)
}

/// Sessions longer than ten minutes get three reminders spread over the
/// deadline; shorter ones are reminded every `base_minutes`.
pub(crate) fn reminder_interval(deadline_minutes: u32, base_minutes: u32) -> Duration {
    if deadline_minutes > 10 {
        Duration::from_secs(u64::from(deadline_minutes) * 60 / 3)
    } else {
        Duration::from_secs(u64::from(base_minutes) * 60)
    }
}

/// Whole minutes between start and `now`, rounded to the nearest minute.
pub(crate) fn elapsed_minutes(started_at: OffsetDateTime, now: OffsetDateTime) -> i32 {
    let seconds = (now - started_at).whole_seconds().max(0);
    ((seconds + 30) / 60) as i32
}
