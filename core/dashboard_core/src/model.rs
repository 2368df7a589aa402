//! Snapshot row types as exported by the hosted store.

use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};

use crate::timeline::parse_instant;
use crate::zone::day_of;

/// Null-tolerant field: the exporter writes `null` for empty columns.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

/// One app on one day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityLogRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub date: String,
    pub app: String,
    #[serde(default, alias = "totalDuration", deserialize_with = "nullable")]
    pub total_duration: String,
    #[serde(default, alias = "sessionCount", deserialize_with = "nullable")]
    pub session_count: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub timeline: String,
    #[serde(default, deserialize_with = "nullable")]
    pub minutes: f64,
}

impl ActivityLogRecord {
    pub fn day(&self) -> Option<Date> {
        day_of(&self.date)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Kept,
    Modified,
    Deleted,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalendarEventRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub date: String,
    #[serde(default, deserialize_with = "nullable")]
    pub start: String,
    #[serde(default, deserialize_with = "nullable")]
    pub end: String,
    #[serde(default)]
    pub new_start: Option<String>,
    #[serde(default)]
    pub new_end: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: EventStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: String,
    #[serde(default, deserialize_with = "nullable")]
    pub calendar_name: String,
    /// Minutes, as stored upstream.
    #[serde(default, deserialize_with = "nullable")]
    pub duration: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub deleted: bool,
}

fn span_minutes(start: &str, end: &str) -> Option<f64> {
    let start = parse_instant(start).ok()?;
    let end = parse_instant(end).ok()?;
    Some((end - start).as_seconds_f64() / 60.0)
}

impl CalendarEventRecord {
    pub fn day(&self) -> Option<Date> {
        day_of(&self.date)
    }

    pub fn planned_start(&self) -> Option<OffsetDateTime> {
        parse_instant(&self.start).ok()
    }

    pub fn planned_end(&self) -> Option<OffsetDateTime> {
        parse_instant(&self.end).ok()
    }

    /// Start after rescheduling, or the planned start when unchanged.
    pub fn actual_start(&self) -> Option<OffsetDateTime> {
        self.new_start
            .as_deref()
            .and_then(|s| parse_instant(s).ok())
            .or_else(|| self.planned_start())
    }

    /// `end - start`; zero when either side does not parse.
    pub fn planned_minutes(&self) -> f64 {
        span_minutes(&self.start, &self.end).unwrap_or(0.0)
    }

    /// `new_end - new_start`, falling back to the planned span.
    pub fn actual_minutes(&self) -> f64 {
        match (self.new_start.as_deref(), self.new_end.as_deref()) {
            (Some(s), Some(e)) => span_minutes(s, e).unwrap_or_else(|| self.planned_minutes()),
            _ => self.planned_minutes(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == EventStatus::Deleted
    }
}
