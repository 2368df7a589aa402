//! The two exported JSON snapshots the dashboard reads.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    error::Error,
    model::{ActivityLogRecord, CalendarEventRecord},
};

pub const ACTIVITY_LOGS_FILE: &str = "activityLogs.json";
pub const CALENDAR_EVENTS_FILE: &str = "calendarEvents.json";

#[derive(Clone, Debug)]
pub struct SnapshotPaths {
    pub activity_logs: PathBuf,
    pub calendar_events: PathBuf,
}

impl SnapshotPaths {
    /// Both files under `dir`, named as the fetcher writes them.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            activity_logs: dir.join(ACTIVITY_LOGS_FILE),
            calendar_events: dir.join(CALENDAR_EVENTS_FILE),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Snapshot {
    pub activity_logs: Vec<ActivityLogRecord>,
    pub calendar_events: Vec<CalendarEventRecord>,
    pub loaded_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotCounts {
    pub activity_logs: usize,
    pub calendar_events: usize,
}

/// A missing file reads as an empty list; a present but malformed one is an
/// error.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Error> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("snapshot {} not found, using empty list", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            activity_logs: Vec::new(),
            calendar_events: Vec::new(),
            loaded_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn load(paths: &SnapshotPaths) -> Result<Self, Error> {
        let snapshot = Self {
            activity_logs: read_rows(&paths.activity_logs)?,
            calendar_events: read_rows(&paths.calendar_events)?,
            loaded_at: OffsetDateTime::now_utc(),
        };
        info!(
            "snapshot loaded: {} activity logs, {} calendar events",
            snapshot.activity_logs.len(),
            snapshot.calendar_events.len()
        );
        Ok(snapshot)
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            activity_logs: self.activity_logs.len(),
            calendar_events: self.calendar_events.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dashboard_core_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_both_files() {
        let dir = scratch_dir("loads");
        std::fs::write(
            dir.join(ACTIVITY_LOGS_FILE),
            r#"[{"id": 1, "date": "2024-11-19", "app": "Cursor", "minutes": 12.5,
                 "timeline": "[]", "session_count": 2, "total_duration": "0:12:30"}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join(CALENDAR_EVENTS_FILE),
            r#"[{"date": "2024-11-19", "start": "2024-11-19T09:00:00Z",
                 "end": "2024-11-19T10:00:00Z", "status": "kept",
                 "summary": "Run", "calendar_name": "Fitness", "duration": 60}]"#,
        )
        .unwrap();

        let snap = Snapshot::load(&SnapshotPaths::in_dir(&dir)).unwrap();
        assert_eq!(
            snap.counts(),
            SnapshotCounts {
                activity_logs: 1,
                calendar_events: 1
            }
        );
        assert_eq!(snap.activity_logs[0].app, "Cursor");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_files_are_empty() {
        let dir = scratch_dir("missing");
        let snap = Snapshot::load(&SnapshotPaths::in_dir(&dir)).unwrap();
        assert_eq!(snap.counts().activity_logs, 0);
        assert_eq!(snap.counts().calendar_events, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = scratch_dir("malformed");
        std::fs::write(dir.join(CALENDAR_EVENTS_FILE), "{ not json").unwrap();
        let err = Snapshot::load(&SnapshotPaths::in_dir(&dir)).unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
