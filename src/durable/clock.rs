use time::OffsetDateTime;
use tokio::time::Instant;

use crate::core::time::to_std_duration;

/// Wall-clock time derived from the tokio monotonic clock.
///
/// The clock is anchored once to a wall-clock reading and advanced by
/// `tokio::time::Instant`, so timers, activity timestamps and paused-time
/// tests all observe the same notion of "now".
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock {
    anchor_wall: OffsetDateTime,
    anchor: Instant,
}

impl Clock {
    pub(crate) fn system() -> Self {
        Self::starting_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn starting_at(wall: OffsetDateTime) -> Self {
        Self { anchor_wall: wall, anchor: Instant::now() }
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.anchor_wall + self.anchor.elapsed()
    }

    pub(crate) async fn sleep_until(&self, at: OffsetDateTime) {
        tokio::time::sleep(to_std_duration(at - self.now())).await;
    }
}

pub(crate) fn to_unix_millis(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_unix_millis(value: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(value as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn advances_with_tokio_time() {
        let clock = Clock::starting_at(datetime!(2025-03-01 10:00 UTC));

        tokio::time::advance(Duration::from_secs(90)).await;

        assert_eq!(clock.now(), datetime!(2025-03-01 10:01:30 UTC));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_until_past_instant_returns_immediately() {
        let clock = Clock::starting_at(datetime!(2025-03-01 10:00 UTC));

        clock.sleep_until(datetime!(2025-03-01 09:00 UTC)).await;

        assert_eq!(clock.now(), datetime!(2025-03-01 10:00 UTC));
    }

    #[test]
    fn unix_millis_conversion_is_lossless_at_millisecond_precision() {
        let value = datetime!(2025-03-01 10:00:00.123 UTC);
        assert_eq!(from_unix_millis(to_unix_millis(value)), value);
    }
}
