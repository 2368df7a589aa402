//! Scanner for the `timeline` column of an activity-log row.
//!
//! The column holds a serialized list of session dicts as written by the
//! upstream exporter, for example:
//!
//! ```text
//! [{'timestamp': Timestamp('2024-11-19 14:32:10.123000+0000', tz='UTC'),
//!   'duration': Timedelta('0 days 00:04:12.500000'), 'during_afk': False}]
//! ```
//!
//! Only the `timestamp`/`duration` pair of each session is extracted. The
//! grammar is fixed and narrow, so entries are found with a single regex
//! sweep instead of a full parser: anything between matches is ignored.

use std::sync::OnceLock;

use regex::{CaptureMatches, Captures, Regex};
use thiserror::Error;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("invalid {field} '{value}' in timeline entry")]
    InvalidField { field: &'static str, value: String },

    #[error("unrecognised timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("session at '{0}' falls outside the representable range")]
    OutOfRange(String),
}

/// One session as written in the blob, before it is anchored in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelineEntry {
    pub timestamp_text: String,
    pub tz_tag: Option<String>,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimelineEntry {
    /// Duration in whole seconds; fractional seconds are dropped.
    pub fn total_seconds(&self) -> i64 {
        i64::from(self.days) * 86_400
            + i64::from(self.hours) * 3_600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds)
    }

    pub fn start(&self) -> Result<OffsetDateTime, TimelineError> {
        parse_instant(&self.timestamp_text)
    }
}

fn re_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"'timestamp':\s*Timestamp\(\s*'(?P<ts>[^']+)'(?:\s*,\s*tz='(?P<tz>[^']*)')?\s*\)\s*,\s*'duration':\s*Timedelta\(\s*'(?P<days>\d+) days? (?P<h>\d+):(?P<m>\d+):(?P<s>\d+)(?:\.\d+)?'\s*\)",
        )
        .unwrap()
    })
}

fn re_instant() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<y>\d{4})-(?P<mo>\d{2})-(?P<d>\d{2})[T ](?P<h>\d{2}):(?P<mi>\d{2}):(?P<s>\d{2})(?:\.(?P<frac>\d+))?\s*(?:(?P<z>Z)|(?P<sign>[+-])(?P<oh>\d{2}):?(?P<om>\d{2}))?$",
        )
        .unwrap()
    })
}

/// Removes one layer of `[` … `]` around the blob, if present.
fn strip_brackets(raw: &str) -> &str {
    let t = raw.trim();
    if t.len() >= 2 && t.starts_with('[') && t.ends_with(']') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}

/// A timeline blob ready to be scanned.
///
/// `entries()` can be called any number of times; each call starts a fresh
/// scan from the beginning of the blob.
#[derive(Clone, Copy, Debug)]
pub struct TimelineParser<'a> {
    body: &'a str,
}

impl<'a> TimelineParser<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            body: strip_brackets(raw),
        }
    }

    pub fn entries(&self) -> TimelineEntries<'a> {
        TimelineEntries {
            inner: re_entry().captures_iter(self.body),
        }
    }
}

/// Lazy sequence of entries. Each match resumes after the previous one, so
/// no session is reported twice.
pub struct TimelineEntries<'a> {
    inner: CaptureMatches<'static, 'a>,
}

impl Iterator for TimelineEntries<'_> {
    type Item = Result<TimelineEntry, TimelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let caps = self.inner.next()?;
        Some(entry_from_captures(&caps))
    }
}

fn int_field(caps: &Captures<'_>, name: &'static str) -> Result<u32, TimelineError> {
    let raw = caps.name(name).map(|m| m.as_str()).unwrap_or("");
    raw.parse().map_err(|_| TimelineError::InvalidField {
        field: name,
        value: raw.to_string(),
    })
}

fn entry_from_captures(caps: &Captures<'_>) -> Result<TimelineEntry, TimelineError> {
    Ok(TimelineEntry {
        timestamp_text: caps["ts"].to_string(),
        tz_tag: caps.name("tz").map(|m| m.as_str().to_string()),
        days: int_field(caps, "days")?,
        hours: int_field(caps, "h")?,
        minutes: int_field(caps, "m")?,
        seconds: int_field(caps, "s")?,
    })
}

/// Parses the timestamp forms seen in snapshots: `T` or space separator,
/// optional fraction, and an optional `Z`, `+HHMM` or `+HH:MM` suffix.
/// A timestamp without a suffix is taken as UTC.
pub fn parse_instant(text: &str) -> Result<OffsetDateTime, TimelineError> {
    let bad = || TimelineError::InvalidTimestamp(text.to_string());
    let caps = re_instant().captures(text.trim()).ok_or_else(bad)?;

    let num = |name: &str| -> Result<u32, TimelineError> {
        caps.name(name)
            .map(|m| m.as_str())
            .unwrap_or("0")
            .parse()
            .map_err(|_| bad())
    };

    let month = Month::try_from(num("mo")? as u8).map_err(|_| bad())?;
    let date = Date::from_calendar_date(num("y")? as i32, month, num("d")? as u8)
        .map_err(|_| bad())?;

    let nanos = match caps.name("frac") {
        Some(m) => {
            let digits: String = m.as_str().chars().chain("000000000".chars()).take(9).collect();
            digits.parse::<u32>().map_err(|_| bad())?
        }
        None => 0,
    };
    let tod = Time::from_hms_nano(num("h")? as u8, num("mi")? as u8, num("s")? as u8, nanos)
        .map_err(|_| bad())?;

    let offset = match caps.name("sign") {
        Some(sign) => {
            let h = num("oh")? as i8;
            let m = num("om")? as i8;
            let (h, m) = if sign.as_str() == "-" { (-h, -m) } else { (h, m) };
            UtcOffset::from_hms(h, m, 0).map_err(|_| bad())?
        }
        None => UtcOffset::UTC,
    };

    Ok(PrimitiveDateTime::new(date, tod).assume_offset(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn collect(raw: &str) -> Vec<TimelineEntry> {
        TimelineParser::new(raw)
            .entries()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn parses_entry_with_offset_suffix() {
        let raw = "['timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]";
        let entries = collect(raw);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.timestamp_text, "2024-01-01T10:00:00+0000");
        assert_eq!(e.tz_tag, None);
        assert_eq!(e.total_seconds(), 60);
        assert_eq!(
            e.start().unwrap(),
            OffsetDateTime::parse("2024-01-01T10:00:00Z", &Rfc3339).unwrap()
        );
    }

    #[test]
    fn parses_pandas_repr_with_tz_tag_and_fractions() {
        let raw = "[{'timestamp': Timestamp('2024-11-19 14:32:10.123000+0000', tz='UTC'), 'duration': Timedelta('0 days 00:04:12.500000'), 'during_afk': False}, {'timestamp': Timestamp('2024-11-19 15:00:00+0000', tz='UTC'), 'duration': Timedelta('1 days 02:00:05'), 'during_afk': True}]";
        let entries = collect(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tz_tag.as_deref(), Some("UTC"));
        assert_eq!(entries[0].total_seconds(), 4 * 60 + 12);
        assert_eq!(entries[0].start().unwrap().nanosecond(), 123_000_000);
        assert_eq!(entries[1].total_seconds(), 86_400 + 2 * 3_600 + 5);
    }

    #[test]
    fn timestamp_without_suffix_is_utc() {
        let raw = "[{'timestamp': Timestamp('2024-03-05 08:15:00'), 'duration': Timedelta('0 days 00:10:00')}]";
        let entries = collect(raw);
        assert_eq!(entries.len(), 1);
        let start = entries[0].start().unwrap();
        assert_eq!(start.offset(), UtcOffset::UTC);
        assert_eq!(start.hour(), 8);
        assert_eq!(start.minute(), 15);
    }

    #[test]
    fn negative_and_colon_offsets() {
        let t = parse_instant("2024-03-05T08:15:00-0130").unwrap();
        assert_eq!(t.offset(), UtcOffset::from_hms(-1, -30, 0).unwrap());
        assert_eq!(t.to_offset(UtcOffset::UTC).hour(), 9);
        assert_eq!(t.to_offset(UtcOffset::UTC).minute(), 45);

        let t = parse_instant("2024-03-05T08:15:00+01:00").unwrap();
        assert_eq!(t.to_offset(UtcOffset::UTC).hour(), 7);

        let t = parse_instant("2024-03-05T08:15:00Z").unwrap();
        assert_eq!(t.offset(), UtcOffset::UTC);

        assert!(parse_instant("yesterday").is_err());
        assert!(parse_instant("2024-13-05T08:15:00Z").is_err());
    }

    #[test]
    fn double_brackets_strip_only_one_layer() {
        let raw = "[['timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]]";
        assert_eq!(strip_brackets(raw).chars().next(), Some('['));
        assert_eq!(collect(raw).len(), 1);
    }

    #[test]
    fn unbracketed_blob_is_scanned_as_is() {
        let raw = "'timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')";
        assert_eq!(collect(raw).len(), 1);
    }

    #[test]
    fn no_matches_is_an_empty_sequence() {
        assert!(collect("").is_empty());
        assert!(collect("[]").is_empty());
        assert!(collect("not a timeline at all").is_empty());
    }

    #[test]
    fn overflowing_field_fails_the_entry() {
        let raw = "['timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('99999999999 days 00:01:00')]";
        let results: Vec<_> = TimelineParser::new(raw).entries().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(TimelineError::InvalidField { field: "days", .. })
        ));
    }

    #[test]
    fn entries_can_be_restarted() {
        let raw = "['timestamp': Timestamp('2024-01-01T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00'), 'timestamp': Timestamp('2024-01-01T11:00:00+0000'), 'duration': Timedelta('0 days 00:02:00')]";
        let parser = TimelineParser::new(raw);
        let first: Vec<_> = parser.entries().map(|e| e.unwrap().total_seconds()).collect();
        let second: Vec<_> = parser.entries().map(|e| e.unwrap().total_seconds()).collect();
        assert_eq!(first, vec![60, 120]);
        assert_eq!(first, second);
    }
}
