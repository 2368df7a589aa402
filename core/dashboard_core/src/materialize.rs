use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, trace};

use crate::{
    category::Categorizer,
    model::ActivityLogRecord,
    timeline::{TimelineEntry, TimelineError, TimelineParser},
};

/// Sessions shorter than this are background noise and never reach a chart.
pub const MIN_SESSION_SECONDS: i64 = 30;

/// A session anchored in time. `end - start` is at least
/// [`MIN_SESSION_SECONDS`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageInterval {
    pub app: String,
    pub category: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl UsageInterval {
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).whole_seconds()
    }
}

/// Anchors one entry. `Ok(None)` means the session was too short to keep.
///
/// With a display zone the instant is re-expressed in that zone, so hour
/// fields read as local wall-clock time whatever offset the source carried.
pub fn materialize_entry(
    entry: &TimelineEntry,
    app: &str,
    category: &str,
    zone: Option<UtcOffset>,
) -> Result<Option<UsageInterval>, TimelineError> {
    let total = entry.total_seconds();
    if total < MIN_SESSION_SECONDS {
        trace!("skip short session for {app}: {total}s");
        return Ok(None);
    }

    let out_of_range = || TimelineError::OutOfRange(entry.timestamp_text.clone());
    let mut start = entry.start()?;
    if let Some(zone) = zone {
        start = start.checked_to_offset(zone).ok_or_else(out_of_range)?;
    }
    let end = start
        .checked_add(time::Duration::seconds(total))
        .ok_or_else(out_of_range)?;

    Ok(Some(UsageInterval {
        app: app.to_string(),
        category: category.to_string(),
        start,
        end,
    }))
}

/// All intervals of one record. Any bad entry fails the whole record; the
/// caller decides whether to skip it.
pub fn materialize_record(
    record: &ActivityLogRecord,
    categorizer: &Categorizer,
    zone: Option<UtcOffset>,
) -> Result<Vec<UsageInterval>, TimelineError> {
    let category = categorizer.category(&record.app);
    let mut out = Vec::new();
    let mut matched = 0usize;

    for entry in TimelineParser::new(&record.timeline).entries() {
        matched += 1;
        if let Some(interval) = materialize_entry(&entry?, &record.app, category, zone)? {
            out.push(interval);
        }
    }

    if matched == 0 {
        debug!("no timeline entries for {} on {}", record.app, record.date);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn record(app: &str, timeline: &str) -> ActivityLogRecord {
        ActivityLogRecord {
            id: None,
            date: "2024-01-01".to_string(),
            app: app.to_string(),
            total_duration: String::new(),
            session_count: 1,
            timeline: timeline.to_string(),
            minutes: 1.0,
        }
    }

    fn entry(ts: &str, duration: &str) -> String {
        format!("'timestamp': Timestamp('{ts}'), 'duration': Timedelta('{duration}')")
    }

    #[test]
    fn one_minute_session_utc() {
        let r = record(
            "Cursor",
            "['timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]",
        );
        let out = materialize_record(&r, &Categorizer::default(), None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].app, "Cursor");
        assert_eq!(out[0].category, "Productivity");
        assert_eq!(out[0].start, OffsetDateTime::parse("2024-01-01T10:00:00Z", &Rfc3339).unwrap());
        assert_eq!(out[0].end, OffsetDateTime::parse("2024-01-01T10:01:00Z", &Rfc3339).unwrap());
    }

    #[test]
    fn display_zone_shifts_wall_clock_not_instant() {
        let r = record(
            "Slack",
            "['timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]",
        );
        let zone = UtcOffset::from_hms(1, 0, 0).unwrap();
        let out = materialize_record(&r, &Categorizer::default(), Some(zone)).unwrap();
        assert_eq!(out[0].start.hour(), 11);
        assert_eq!(out[0].end.hour(), 11);
        assert_eq!(out[0].end.minute(), 1);
        assert_eq!(
            out[0].start,
            OffsetDateTime::parse("2024-01-01T10:00:00Z", &Rfc3339).unwrap()
        );
    }

    #[test]
    fn twenty_second_session_is_dropped() {
        let r = record(
            "Cursor",
            &format!("[{}]", entry("2024-01-01T10:00:00+0000", "0 days 00:00:20")),
        );
        assert!(materialize_record(&r, &Categorizer::default(), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn never_emits_short_intervals() {
        let parts: Vec<String> = [0, 1, 29, 30, 31, 59, 3600]
            .iter()
            .map(|s| entry("2024-01-01T10:00:00+0000", &format!("0 days 00:{:02}:{:02}", s / 60, s % 60)))
            .collect();
        let r = record("Cursor", &format!("[{}]", parts.join(", ")));
        let out = materialize_record(&r, &Categorizer::default(), None).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|i| i.seconds() >= MIN_SESSION_SECONDS && i.end > i.start));
    }

    #[test]
    fn bad_timestamp_fails_the_record() {
        let r = record(
            "Cursor",
            &format!("[{}]", entry("not-a-time", "0 days 00:05:00")),
        );
        assert!(matches!(
            materialize_record(&r, &Categorizer::default(), None),
            Err(TimelineError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn huge_duration_fails_the_record() {
        let r = record(
            "Cursor",
            &format!("[{}]", entry("2024-01-01T10:00:00+0000", "3000000 days 00:00:00")),
        );
        assert!(matches!(
            materialize_record(&r, &Categorizer::default(), None),
            Err(TimelineError::OutOfRange(_))
        ));
    }

    #[test]
    fn unmapped_app_gets_fallback_category() {
        let r = record(
            "SomethingNew",
            &format!("[{}]", entry("2024-01-01T10:00:00+0000", "0 days 00:05:00")),
        );
        let out = materialize_record(&r, &Categorizer::default(), None).unwrap();
        assert_eq!(out[0].category, crate::category::OTHER);
    }
}
