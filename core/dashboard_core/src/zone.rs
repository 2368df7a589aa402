//! Display-zone and calendar-day helpers shared by the pipeline and the HTTP layer.

use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime, UtcOffset};

pub const TZ_OFFSET_MINUTES_MIN: i32 = -14 * 60;
pub const TZ_OFFSET_MINUTES_MAX: i32 = 14 * 60;

pub fn normalize_tz_offset_minutes(v: Option<i32>) -> i32 {
    v.unwrap_or(0)
        .clamp(TZ_OFFSET_MINUTES_MIN, TZ_OFFSET_MINUTES_MAX)
}

pub fn tz_offset_from_minutes(minutes: i32) -> UtcOffset {
    UtcOffset::from_whole_seconds(minutes.saturating_mul(60)).unwrap_or(UtcOffset::UTC)
}

/// Parses `YYYY-MM-DD`.
pub fn parse_date(date: &str) -> Option<Date> {
    let parts: Vec<&str> = date.trim().split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let y: i32 = parts[0].parse().ok()?;
    let m: u8 = parts[1].parse().ok()?;
    let d: u8 = parts[2].parse().ok()?;
    let month = time::Month::try_from(m).ok()?;
    Date::from_calendar_date(y, month, d).ok()
}

/// Calendar day of a snapshot `date` field, which may carry a trailing time part
/// (`2024-11-19`, `2024-11-19T00:00:00+00:00`, `2024-11-19 00:00:00`).
pub fn day_of(field: &str) -> Option<Date> {
    parse_date(field.trim().get(0..10)?)
}

pub fn today_in(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}

pub fn days_before(date: Date, days: i64) -> Date {
    date.checked_sub(time::Duration::days(days)).unwrap_or(Date::MIN)
}

pub fn fmt_ts(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_default()
}

/// 24-hour `HH:MM`.
pub fn fmt_hhmm(t: OffsetDateTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// 12-hour `h:mm AM`.
pub fn fmt_clock(t: OffsetDateTime) -> String {
    let (h, suffix) = match t.hour() {
        0 => (12, "AM"),
        h @ 1..=11 => (h, "AM"),
        12 => (12, "PM"),
        h => (h - 12, "PM"),
    };
    format!("{h}:{:02} {suffix}", t.minute())
}

/// Short month + day, e.g. `Nov 19`.
pub fn fmt_month_day(date: Date) -> String {
    let month = date.month().to_string();
    format!("{} {}", month.get(0..3).unwrap_or(&month), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tz_offset_is_clamped() {
        assert_eq!(normalize_tz_offset_minutes(None), 0);
        assert_eq!(normalize_tz_offset_minutes(Some(60)), 60);
        assert_eq!(normalize_tz_offset_minutes(Some(20 * 60)), TZ_OFFSET_MINUTES_MAX);
        assert_eq!(normalize_tz_offset_minutes(Some(-20 * 60)), TZ_OFFSET_MINUTES_MIN);

        let tz = tz_offset_from_minutes(-5 * 60);
        assert_eq!(tz.whole_hours(), -5);
    }

    #[test]
    fn day_of_accepts_date_and_datetime_fields() {
        let d = parse_date("2024-11-19").unwrap();
        assert_eq!(day_of("2024-11-19"), Some(d));
        assert_eq!(day_of("2024-11-19T00:00:00+00:00"), Some(d));
        assert_eq!(day_of("2024-11-19 08:30:00"), Some(d));
        assert_eq!(day_of("19/11/2024"), None);
        assert_eq!(day_of(""), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn clock_formats() {
        let t = OffsetDateTime::parse("2024-01-01T00:05:00Z", &Rfc3339).unwrap();
        assert_eq!(fmt_clock(t), "12:05 AM");
        assert_eq!(fmt_hhmm(t), "00:05");
        let t = OffsetDateTime::parse("2024-01-01T13:30:00Z", &Rfc3339).unwrap();
        assert_eq!(fmt_clock(t), "1:30 PM");
        let t = OffsetDateTime::parse("2024-01-01T12:00:00Z", &Rfc3339).unwrap();
        assert_eq!(fmt_clock(t), "12:00 PM");
        assert_eq!(fmt_month_day(parse_date("2024-11-09").unwrap()), "Nov 9");
    }
}
