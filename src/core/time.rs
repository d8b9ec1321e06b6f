use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Session timestamps are stored as `TIMESTAMP` columns in UTC.
pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    format_offset(value.assume_utc())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Negative spans collapse to zero so an overdue deadline sleeps for nothing.
pub(crate) fn to_std_duration(value: time::Duration) -> std::time::Duration {
    if value.is_negative() {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::try_from(value).unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    #[test]
    fn to_primitive_utc_normalizes_offset() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(13, 20, 30).unwrap();
        let local = PrimitiveDateTime::new(date, time)
            .assume_offset(UtcOffset::from_hms(3, 0, 0).unwrap());

        let stored = to_primitive_utc(local);
        assert_eq!(stored.time(), Time::from_hms(10, 20, 30).unwrap());
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        assert_eq!(format_primitive(PrimitiveDateTime::new(date, time)), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn format_offset_preserves_offset() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        let utc = PrimitiveDateTime::new(date, time).assume_utc();
        let offset = UtcOffset::from_hms(3, 0, 0).unwrap();
        let shifted = utc.to_offset(offset);
        assert_eq!(format_offset(shifted), "2025-01-02T13:20:30+03:00");
    }

    #[test]
    fn negative_spans_become_zero() {
        assert_eq!(to_std_duration(time::Duration::seconds(-5)), std::time::Duration::ZERO);
        assert_eq!(to_std_duration(time::Duration::seconds(90)).as_secs(), 90);
    }
}
