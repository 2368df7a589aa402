//! Day consistency scoring over the calendar snapshot.
//!
//! Each day starts at 100. Deleted commitments cost their share of the day's
//! planned minutes; resized ones cost half of their change's share. A weekly
//! goal check-in then moves every day of that week up or down, and the result
//! is clamped to `[0, 100]`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::Date;
use tracing::debug;

use crate::{
    model::{CalendarEventRecord, EventStatus},
    zone::days_before,
};

pub const DEFAULT_GOALS_CALENDAR: &str = "Goals";
/// Relative duration change above which a modified event spoils a perfect day.
pub const PERFECT_DAY_TOLERANCE: f64 = 0.2;
const DELETED_WEIGHT: f64 = 100.0;
const MODIFIED_WEIGHT: f64 = 50.0;
const COMPOUND_DIVISOR: f64 = 10.0;
const PERFECT_DAYS_SPAN: i64 = 28;

/// Score shift for a week with `achieved` of five goals met. Only a perfect
/// week is rewarded.
pub fn goal_adjustment(achieved: Option<i64>) -> f64 {
    match achieved {
        Some(5) => 15.0,
        Some(4) => -5.0,
        Some(3) => -10.0,
        Some(2) => -15.0,
        Some(1) => -20.0,
        _ => -30.0,
    }
}

/// Goals achieved as written in a check-in summary. Numeric text such as
/// `"5"`, `" 4 "` or `"5.0"` counts; fractions and words do not.
pub fn goal_count(summary: &str) -> Option<i64> {
    let n: f64 = summary.trim().parse().ok()?;
    (n.is_finite() && n.fract() == 0.0 && n.abs() <= i64::MAX as f64).then_some(n as i64)
}

/// Adjustment per day. A goals event covers its own date and the six days
/// before it; a later event wins where weeks overlap.
pub fn weekly_goal_adjustments(
    events: &[CalendarEventRecord],
    goals_calendar: &str,
) -> HashMap<Date, f64> {
    let mut out = HashMap::new();
    for e in events.iter().filter(|e| e.calendar_name == goals_calendar) {
        let Some(day) = e.day() else {
            continue;
        };
        let adjustment = goal_adjustment(goal_count(&e.summary));
        for back in 0..7 {
            out.insert(days_before(day, back), adjustment);
        }
    }
    out
}

pub fn group_by_day(events: &[CalendarEventRecord]) -> BTreeMap<Date, Vec<&CalendarEventRecord>> {
    let mut out: BTreeMap<Date, Vec<&CalendarEventRecord>> = BTreeMap::new();
    for e in events {
        match e.day() {
            Some(d) => out.entry(d).or_default().push(e),
            None => debug!("calendar event with unreadable date '{}'", e.date),
        }
    }
    out
}

/// Score before the goal adjustment and clamping. `None` when the day has no
/// planned time to measure against.
pub fn raw_day_score(events: &[&CalendarEventRecord]) -> Option<f64> {
    let total_planned: f64 = events.iter().map(|e| e.planned_minutes()).sum();
    if events.is_empty() || total_planned.is_nan() || total_planned <= 0.0 {
        return None;
    }

    let mut score = 100.0;
    for e in events {
        match e.status {
            EventStatus::Deleted => {
                score -= e.planned_minutes() / total_planned * DELETED_WEIGHT;
            }
            EventStatus::Modified => {
                let change = (e.planned_minutes() - e.actual_minutes()).abs();
                score -= change / total_planned * MODIFIED_WEIGHT;
            }
            EventStatus::Kept | EventStatus::Unknown => {}
        }
    }
    Some(score)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyConsistencyScore {
    pub day: usize,
    pub date: String,
    pub completion: f64,
    pub seven_day_avg: f64,
    pub thirty_day_avg: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn trailing_mean(scores: &[f64], index: usize, span: usize) -> f64 {
    let from = (index + 1).saturating_sub(span);
    let window = &scores[from..=index];
    window.iter().sum::<f64>() / window.len() as f64
}

/// One entry per day that has events, oldest first. Averages run over the
/// preceding scored days and never reach before the first one.
pub fn daily_scores(
    events: &[CalendarEventRecord],
    goals_calendar: &str,
) -> Vec<DailyConsistencyScore> {
    let goals = weekly_goal_adjustments(events, goals_calendar);

    let mut days: Vec<(Date, f64)> = Vec::new();
    for (date, day_events) in group_by_day(events) {
        let Some(raw) = raw_day_score(&day_events) else {
            debug!("{date}: no planned minutes, not scored");
            continue;
        };
        let adjusted = raw + goals.get(&date).copied().unwrap_or(0.0);
        days.push((date, adjusted.clamp(0.0, 100.0)));
    }

    let scores: Vec<f64> = days.iter().map(|(_, s)| *s).collect();
    days.iter()
        .enumerate()
        .map(|(i, (date, score))| DailyConsistencyScore {
            day: i + 1,
            date: date.to_string(),
            completion: round2(*score),
            seven_day_avg: round2(trailing_mean(&scores, i, 7)),
            thirty_day_avg: round2(trailing_mean(&scores, i, 30)),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompoundedConsistency {
    pub day: usize,
    pub compounded_actual: f64,
    pub perfect_compound: f64,
}

/// Running totals of the daily scores against an always-100 baseline.
pub fn compound_consistency(scores: &[DailyConsistencyScore]) -> Vec<CompoundedConsistency> {
    let mut running = 0.0;
    let mut perfect = 0.0;
    scores
        .iter()
        .map(|s| {
            running += s.completion;
            perfect += 100.0;
            CompoundedConsistency {
                day: s.day,
                compounded_actual: round2(running / COMPOUND_DIVISOR),
                perfect_compound: perfect / COMPOUND_DIVISOR,
            }
        })
        .collect()
}

/// Relative change of a modified event, `|planned - actual| / planned`.
pub(crate) fn relative_change(e: &CalendarEventRecord) -> f64 {
    let planned = e.planned_minutes();
    let diff = (planned - e.actual_minutes()).abs();
    if planned > 0.0 {
        diff / planned
    } else if diff > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

pub fn is_perfect_day(events: &[&CalendarEventRecord]) -> bool {
    !events.is_empty()
        && events.iter().all(|e| match e.status {
            EventStatus::Deleted => false,
            EventStatus::Modified => relative_change(e) <= PERFECT_DAY_TOLERANCE,
            EventStatus::Kept | EventStatus::Unknown => true,
        })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerfectDay {
    pub date: String,
    pub is_perfect: bool,
    pub day_number: usize,
}

/// The 28 days before `today`; a day without events is not perfect.
pub fn perfect_days(events: &[CalendarEventRecord], today: Date) -> Vec<PerfectDay> {
    let by_day = group_by_day(events);
    let first = days_before(today, PERFECT_DAYS_SPAN);
    (0..PERFECT_DAYS_SPAN)
        .map(|i| {
            let date = first + time::Duration::days(i);
            let day_events = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            PerfectDay {
                date: date.to_string(),
                is_perfect: is_perfect_day(day_events),
                day_number: i as usize + 1,
            }
        })
        .collect()
}
