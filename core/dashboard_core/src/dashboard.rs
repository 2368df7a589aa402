//! Request-level entry points: the categorizer and display settings bound
//! once, the snapshot passed per call.

use serde::Serialize;
use time::{Date, UtcOffset};

use crate::{
    aggregate::{aggregate_usage, category_breakdown, format_minutes, gantt_feed, AggregatedUsage, CategoryUsage, DateWindow},
    category::Categorizer,
    consistency::{self, CompoundedConsistency, DailyConsistencyScore, PerfectDay, DEFAULT_GOALS_CALENDAR},
    gantt::{gantt_bars, lanes, GanttBar, LaneKey, DEFAULT_DAY_START_HOUR},
    insights::{self, ActionItem, MissedCommitment, TaskLoad, Timeframe, Trend, WakeUpPoint, WeeklyGoal, WeeklyStats, DEFAULT_TASK_CALENDARS},
    snapshot::Snapshot,
    zone::{fmt_ts, normalize_tz_offset_minutes, today_in, tz_offset_from_minutes},
};

pub const DEFAULT_WAKE_CALENDAR: &str = "Wake";

#[derive(Clone, Debug)]
pub struct DashboardSettings {
    /// Display zone used when a request does not name one.
    pub tz_offset_minutes: i32,
    pub day_start_hour: u8,
    pub goals_calendar: String,
    pub wake_calendar: String,
    pub task_calendars: Vec<String>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            tz_offset_minutes: 0,
            day_start_hour: DEFAULT_DAY_START_HOUR,
            goals_calendar: DEFAULT_GOALS_CALENDAR.to_string(),
            wake_calendar: DEFAULT_WAKE_CALENDAR.to_string(),
            task_calendars: DEFAULT_TASK_CALENDARS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UsageRow {
    #[serde(flatten)]
    pub usage: AggregatedUsage,
    pub duration: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct GanttView {
    pub bars: Vec<GanttBar>,
    pub records_seen: usize,
    pub records_skipped: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SpanView {
    pub start_ts: String,
    pub end_ts: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LaneView {
    pub key: String,
    pub category: String,
    pub color: &'static str,
    pub apps: Vec<String>,
    pub total_seconds: i64,
    pub duration: String,
    pub spans: Vec<SpanView>,
}

#[derive(Clone, Debug)]
pub struct Dashboard {
    categorizer: Categorizer,
    settings: DashboardSettings,
}

impl Dashboard {
    pub fn new(categorizer: Categorizer, settings: DashboardSettings) -> Self {
        Self {
            categorizer,
            settings,
        }
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// The request's zone, or the configured one. Offsets are clamped to ±14 h.
    pub fn zone(&self, tz_offset_minutes: Option<i32>) -> UtcOffset {
        let minutes = tz_offset_minutes.unwrap_or(self.settings.tz_offset_minutes);
        tz_offset_from_minutes(normalize_tz_offset_minutes(Some(minutes)))
    }

    pub fn today(&self, zone: UtcOffset) -> Date {
        today_in(zone)
    }

    pub fn usage_summary(&self, snap: &Snapshot, window: DateWindow, today: Date) -> Vec<UsageRow> {
        aggregate_usage(&snap.activity_logs, window, today, &self.categorizer)
            .into_iter()
            .map(|usage| UsageRow {
                duration: format_minutes(usage.minutes),
                usage,
            })
            .collect()
    }

    pub fn categories(&self, snap: &Snapshot, window: DateWindow, today: Date) -> Vec<CategoryUsage> {
        category_breakdown(&snap.activity_logs, window, today, &self.categorizer)
    }

    pub fn gantt(
        &self,
        snap: &Snapshot,
        window: DateWindow,
        today: Date,
        zone: UtcOffset,
        day_start_hour: Option<u8>,
    ) -> GanttView {
        let feed = gantt_feed(&snap.activity_logs, window, today, &self.categorizer, Some(zone));
        let day_start = day_start_hour.unwrap_or(self.settings.day_start_hour);
        GanttView {
            bars: gantt_bars(&feed.intervals, &self.categorizer, day_start),
            records_seen: feed.records_seen,
            records_skipped: feed.records_skipped,
        }
    }

    pub fn gantt_lanes(
        &self,
        snap: &Snapshot,
        window: DateWindow,
        today: Date,
        zone: UtcOffset,
        key: LaneKey,
    ) -> Vec<LaneView> {
        let feed = gantt_feed(&snap.activity_logs, window, today, &self.categorizer, Some(zone));
        lanes(&feed.intervals, key)
            .into_iter()
            .map(|lane| {
                let total_seconds = lane.total_seconds();
                let color = lane
                    .apps
                    .first()
                    .map(|app| self.categorizer.color_for(app))
                    .unwrap_or_else(|| self.categorizer.color_for(&lane.key));
                LaneView {
                    color,
                    total_seconds,
                    duration: format_minutes(total_seconds as f64 / 60.0),
                    spans: lane
                        .spans
                        .iter()
                        .map(|s| SpanView {
                            start_ts: fmt_ts(s.start),
                            end_ts: fmt_ts(s.end),
                        })
                        .collect(),
                    key: lane.key,
                    category: lane.category,
                    apps: lane.apps,
                }
            })
            .collect()
    }

    pub fn daily_consistency(&self, snap: &Snapshot) -> Vec<DailyConsistencyScore> {
        consistency::daily_scores(&snap.calendar_events, &self.settings.goals_calendar)
    }

    pub fn compounded_consistency(&self, snap: &Snapshot) -> Vec<CompoundedConsistency> {
        consistency::compound_consistency(&self.daily_consistency(snap))
    }

    pub fn perfect_days(&self, snap: &Snapshot, today: Date) -> Vec<PerfectDay> {
        consistency::perfect_days(&snap.calendar_events, today)
    }

    pub fn weekly_stats(&self, snap: &Snapshot, today: Date) -> WeeklyStats {
        insights::weekly_stats(&snap.calendar_events, today)
    }

    pub fn missed_commitments(&self, snap: &Snapshot, today: Date, zone: UtcOffset) -> Vec<MissedCommitment> {
        insights::missed_commitments(&snap.calendar_events, today, zone)
    }

    pub fn action_items(&self, snap: &Snapshot, today: Date, zone: UtcOffset) -> Vec<ActionItem> {
        insights::action_items(&snap.calendar_events, today, zone)
    }

    pub fn task_distribution(&self, snap: &Snapshot, timeframe: Timeframe, today: Date) -> Vec<TaskLoad> {
        insights::task_distribution(&snap.calendar_events, &self.settings.task_calendars, timeframe, today)
    }

    pub fn wake_up_pattern(&self, snap: &Snapshot, today: Date, zone: UtcOffset) -> Vec<WakeUpPoint> {
        insights::wake_up_pattern(&snap.calendar_events, &self.settings.wake_calendar, today, zone)
    }

    pub fn wake_up_average(&self, snap: &Snapshot, zone: UtcOffset) -> String {
        insights::average_wake_up_time(&snap.calendar_events, &self.settings.wake_calendar, zone)
    }

    pub fn trends(&self, snap: &Snapshot, today: Date) -> Vec<Trend> {
        insights::trends(&snap.calendar_events, today)
    }

    pub fn weekly_goals(&self, snap: &Snapshot) -> Vec<WeeklyGoal> {
        insights::weekly_goals(&snap.calendar_events, &self.settings.goals_calendar)
    }
}
