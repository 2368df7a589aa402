//! Calendar summaries shown around the consistency chart.
//!
//! Every function is pure over the event list; `today` and the display zone
//! come from the caller so results are reproducible.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{
    consistency::{goal_count, group_by_day, is_perfect_day},
    model::{CalendarEventRecord, EventStatus},
    zone::{days_before, fmt_hhmm, fmt_month_day},
};

pub const DEFAULT_WAKE_SUMMARY: &str = "wake up";
pub const DEFAULT_TASK_CALENDARS: [&str; 3] = ["Fitness", "Projects", "Learning"];
/// Shortfall beyond which a modified event counts as missed.
pub const SHORTENED_THRESHOLD: f64 = 0.25;
const WEEKDAYS_SHORT: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn dated_since<'a>(
    events: &'a [CalendarEventRecord],
    since: Date,
) -> impl Iterator<Item = &'a CalendarEventRecord> {
    events
        .iter()
        .filter(move |e| e.day().is_some_and(|d| d >= since))
}

fn local_start(e: &CalendarEventRecord, zone: UtcOffset) -> Option<OffsetDateTime> {
    e.planned_start().and_then(|t| t.checked_to_offset(zone))
}

fn hours_of(t: OffsetDateTime) -> f64 {
    f64::from(t.hour()) + f64::from(t.minute()) / 60.0
}

/// Modified and actually run for more than a quarter less than planned.
pub fn is_significantly_shortened(e: &CalendarEventRecord) -> bool {
    if e.status != EventStatus::Modified {
        return false;
    }
    let planned = e.planned_minutes();
    planned > 0.0 && (planned - e.actual_minutes()) / planned > SHORTENED_THRESHOLD
}

fn is_missed(e: &CalendarEventRecord) -> bool {
    e.is_deleted() || is_significantly_shortened(e)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeeklyStats {
    pub weekly_completion: i64,
    pub perfect_days: usize,
    pub canceled_percentage: i64,
}

pub fn weekly_stats(events: &[CalendarEventRecord], today: Date) -> WeeklyStats {
    let week: Vec<CalendarEventRecord> = dated_since(events, days_before(today, 7)).cloned().collect();

    let mut planned = 0.0;
    let mut actual = 0.0;
    let mut deleted = 0usize;
    for e in &week {
        planned += e.planned_minutes();
        if e.is_deleted() {
            deleted += 1;
        } else {
            actual += e.actual_minutes();
        }
    }

    let perfect_days = group_by_day(&week)
        .values()
        .filter(|day| is_perfect_day(day))
        .count();

    let weekly_completion = if planned > 0.0 {
        ((actual / planned) * 100.0).round() as i64
    } else {
        100
    };
    let canceled_percentage = if week.is_empty() {
        0
    } else {
        ((deleted as f64 / week.len() as f64) * 100.0).round() as i64
    };

    WeeklyStats {
        weekly_completion: weekly_completion.min(100),
        perfect_days,
        canceled_percentage,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MissedCommitment {
    pub id: usize,
    pub activity: String,
    pub time: String,
    pub day: String,
    pub pattern: String,
    pub reflection: String,
    pub impact: Level,
}

/// `1st`, `2nd`, `3rd`, `4th`, ..., `11th`, `21st`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn short_duration(minutes: f64) -> String {
    let minutes = minutes.round().max(0.0) as i64;
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else {
        format!("{m}m")
    }
}

fn reflection_for_hour(hour: u8) -> &'static str {
    if hour < 9 {
        "Planned too early, consistently struggling with morning focus"
    } else if hour >= 19 {
        "Too tired for focused activity this late"
    } else {
        "Need to investigate reasons for missing this commitment"
    }
}

fn impact_of(e: &CalendarEventRecord) -> Level {
    if e.duration > 120.0 {
        Level::High
    } else if e.duration > 60.0 {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Deleted or significantly shortened events from the past week.
pub fn missed_commitments(
    events: &[CalendarEventRecord],
    today: Date,
    zone: UtcOffset,
) -> Vec<MissedCommitment> {
    let missed: Vec<&CalendarEventRecord> = dated_since(events, days_before(today, 7))
        .filter(|e| is_missed(e))
        .collect();

    missed
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let start = local_start(e, zone);
            let end = e.planned_end().and_then(|t| t.checked_to_offset(zone));
            let time = match (start, end) {
                (Some(s), Some(t)) => format!("{} - {}", fmt_hhmm(s), fmt_hhmm(t)),
                _ => String::new(),
            };

            let repeats = missed.iter().filter(|m| m.summary == e.summary).count();
            let pattern = match repeats {
                0 | 1 => "First occurrence".to_string(),
                2 => "2nd time this week".to_string(),
                n => format!("{} time this month", ordinal(n)),
            };

            let reflection = if e.is_deleted() {
                reflection_for_hour(start.map(|s| s.hour()).unwrap_or(12)).to_string()
            } else {
                format!(
                    "Significantly shortened: {} planned vs {} actual",
                    short_duration(e.planned_minutes()),
                    short_duration(e.actual_minutes())
                )
            };

            MissedCommitment {
                id: i + 1,
                activity: e.summary.clone(),
                time,
                day: start.map(|s| s.weekday().to_string()).unwrap_or_default(),
                pattern,
                reflection,
                impact: impact_of(e),
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionItem {
    pub title: String,
    pub description: String,
    pub priority: Level,
    pub category: String,
}

/// Recurring problems over the last 30 days, high priority first.
pub fn action_items(
    events: &[CalendarEventRecord],
    today: Date,
    zone: UtcOffset,
) -> Vec<ActionItem> {
    let problems: Vec<&CalendarEventRecord> = dated_since(events, days_before(today, 30))
        .filter(|e| is_missed(e))
        .collect();
    let mut items = Vec::new();

    let morning = problems
        .iter()
        .filter(|e| local_start(e, zone).is_some_and(|s| s.hour() < 10))
        .count();
    if morning >= 3 {
        items.push(ActionItem {
            title: "Morning Commitment Struggles".to_string(),
            description: format!(
                "{morning} early commitments missed or significantly shortened. Consider adjusting morning schedule."
            ),
            priority: Level::High,
            category: "schedule".to_string(),
        });
    }

    let shortened = problems
        .iter()
        .filter(|e| is_significantly_shortened(e))
        .count();
    if shortened >= 3 {
        items.push(ActionItem {
            title: "Duration Planning Issues".to_string(),
            description: format!(
                "{shortened} activities significantly shortened. Consider more realistic duration planning."
            ),
            priority: if shortened >= 5 { Level::High } else { Level::Medium },
            category: "planning".to_string(),
        });
    }

    let mut by_calendar: BTreeMap<String, usize> = BTreeMap::new();
    for e in &problems {
        *by_calendar.entry(e.calendar_name.to_lowercase()).or_default() += 1;
    }
    for (calendar, count) in by_calendar {
        if count < 3 {
            continue;
        }
        items.push(ActionItem {
            title: format!("Recurring \"{calendar}\" Challenges"),
            description: format!(
                "{count} {calendar} sessions missed across calendars. Review scheduling and commitment approach."
            ),
            priority: if count >= 5 { Level::High } else { Level::Medium },
            category: calendar,
        });
    }

    let long_misses = problems
        .iter()
        .filter(|e| e.planned_minutes() >= 90.0)
        .count();
    if long_misses >= 5 {
        items.push(ActionItem {
            title: "Long Duration Activity Issues".to_string(),
            description: "Multiple long sessions missed. Consider breaking into shorter segments."
                .to_string(),
            priority: Level::High,
            category: "schedule".to_string(),
        });
    }

    items.sort_by_key(|i| i.priority != Level::High);
    items
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Timeframe {
    #[default]
    Weekly,
    Monthly,
}

impl Timeframe {
    pub fn days(self) -> i64 {
        match self {
            Timeframe::Weekly => 7,
            Timeframe::Monthly => 30,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" => Some(Timeframe::Weekly),
            "monthly" | "month" => Some(Timeframe::Monthly),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskLoad {
    pub name: String,
    pub planned: f64,
    pub actual: f64,
}

/// Planned and actual hours per tracked calendar, in the order given.
/// Deleted events add to planned only.
pub fn task_distribution(
    events: &[CalendarEventRecord],
    calendars: &[String],
    timeframe: Timeframe,
    today: Date,
) -> Vec<TaskLoad> {
    let mut out: Vec<TaskLoad> = calendars
        .iter()
        .map(|name| TaskLoad {
            name: name.clone(),
            planned: 0.0,
            actual: 0.0,
        })
        .collect();

    for e in dated_since(events, days_before(today, timeframe.days())) {
        let Some(load) = out.iter_mut().find(|l| l.name == e.calendar_name) else {
            continue;
        };
        load.planned += e.planned_minutes() / 60.0;
        if !e.is_deleted() {
            load.actual += e.actual_minutes() / 60.0;
        }
    }
    out
}

fn is_wake_event(e: &CalendarEventRecord, wake_calendar: &str) -> bool {
    e.calendar_name == wake_calendar && e.summary.to_lowercase() == DEFAULT_WAKE_SUMMARY
}

/// Mean local start time of wake-up events as `H:MM`. Events flagged as
/// deleted upstream are left out.
pub fn average_wake_up_time(
    events: &[CalendarEventRecord],
    wake_calendar: &str,
    zone: UtcOffset,
) -> String {
    let minutes: Vec<f64> = events
        .iter()
        .filter(|e| is_wake_event(e, wake_calendar) && !e.deleted)
        .filter_map(|e| local_start(e, zone))
        .map(|s| hours_of(s) * 60.0)
        .collect();
    if minutes.is_empty() {
        return "0:00".to_string();
    }

    let avg = (minutes.iter().sum::<f64>() / minutes.len() as f64).round() as i64;
    format!("{}:{:02}", avg / 60, avg % 60)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WakeUpPoint {
    pub day: &'static str,
    pub planned: f64,
    pub actual: f64,
}

/// Planned vs actual wake-up hour per weekday over the past eight days,
/// starting at today's weekday. Later events overwrite earlier ones on the
/// same weekday.
pub fn wake_up_pattern(
    events: &[CalendarEventRecord],
    wake_calendar: &str,
    today: Date,
    zone: UtcOffset,
) -> Vec<WakeUpPoint> {
    let mut week: Vec<WakeUpPoint> = WEEKDAYS_SHORT
        .iter()
        .map(|&day| WakeUpPoint {
            day,
            planned: 0.0,
            actual: 0.0,
        })
        .collect();

    for e in dated_since(events, days_before(today, 8)).filter(|e| is_wake_event(e, wake_calendar)) {
        let Some(planned) = local_start(e, zone) else {
            continue;
        };
        let actual = e.actual_start().and_then(|t| t.checked_to_offset(zone)).unwrap_or(planned);
        let slot = &mut week[planned.weekday().number_days_from_sunday() as usize];
        slot.planned = hours_of(planned);
        slot.actual = hours_of(actual);
    }

    week.rotate_left(today.weekday().number_days_from_sunday() as usize);
    week
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trend {
    pub label: &'static str,
    pub percentage: i64,
    pub comparison: String,
    pub timeframe: &'static str,
}

fn completion_rate<'a>(events: impl Iterator<Item = &'a CalendarEventRecord>) -> f64 {
    let (mut total, mut kept) = (0usize, 0usize);
    for e in events {
        total += 1;
        if !e.is_deleted() {
            kept += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        kept as f64 / total as f64 * 100.0
    }
}

fn trend_over(
    events: &[CalendarEventRecord],
    today: Date,
    span: i64,
    label: &'static str,
    timeframe: &'static str,
    unit: &str,
) -> Trend {
    let current_from = days_before(today, span);
    let previous_from = days_before(today, span * 2);
    let current = completion_rate(
        events
            .iter()
            .filter(|e| e.day().is_some_and(|d| d >= current_from && d <= today)),
    );
    let previous = completion_rate(
        events
            .iter()
            .filter(|e| e.day().is_some_and(|d| d >= previous_from && d < current_from)),
    );
    let change = if previous == 0.0 {
        current
    } else {
        (current - previous) / previous * 100.0
    };

    Trend {
        label,
        percentage: change.round() as i64,
        comparison: format!("vs last {unit} ({}%)", previous.round() as i64),
        timeframe,
    }
}

/// Share of events kept, this week and month against the period before.
pub fn trends(events: &[CalendarEventRecord], today: Date) -> Vec<Trend> {
    vec![
        trend_over(events, today, 7, "Weekly Progress", "weekly", "week"),
        trend_over(events, today, 30, "Monthly Progress", "monthly", "month"),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeeklyGoal {
    pub week: String,
    pub achieved: i64,
    pub total: i64,
}

/// The four most recent goal check-ins, oldest first.
pub fn weekly_goals(events: &[CalendarEventRecord], goals_calendar: &str) -> Vec<WeeklyGoal> {
    let mut goals: Vec<(Date, i64)> = events
        .iter()
        .filter(|e| e.calendar_name == goals_calendar)
        .filter_map(|e| Some((e.day()?, goal_count(&e.summary).unwrap_or(0))))
        .collect();
    goals.sort_by_key(|(d, _)| *d);

    let skip = goals.len().saturating_sub(4);
    goals
        .into_iter()
        .skip(skip)
        .map(|(d, achieved)| WeeklyGoal {
            week: fmt_month_day(d),
            achieved,
            total: 5,
        })
        .collect()
}
