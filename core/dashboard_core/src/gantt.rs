//! Gantt layout: collapsed lanes and virtual-day positioning.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{
    aggregate::format_minutes,
    category::Categorizer,
    materialize::UsageInterval,
    zone::{fmt_clock, fmt_ts},
};

pub const DEFAULT_DAY_START_HOUR: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

/// Collapses overlapping or touching spans. The result is sorted by start and
/// pairwise disjoint, so merging it again returns it unchanged.
pub fn merge_spans(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| a.start.cmp(&b.start));

    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = out.last_mut() {
            if span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        }
        out.push(span);
    }
    out
}

pub fn merge_intervals(intervals: &[UsageInterval]) -> Vec<Span> {
    merge_spans(
        intervals
            .iter()
            .map(|i| Span {
                start: i.start,
                end: i.end,
            })
            .collect(),
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneKey {
    Category,
    App,
}

/// One row of the collapsed chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lane {
    pub key: String,
    pub category: String,
    /// Contributing apps in first-seen order.
    pub apps: Vec<String>,
    pub spans: Vec<Span>,
}

impl Lane {
    pub fn total_seconds(&self) -> i64 {
        self.spans.iter().map(|s| (s.end - s.start).whole_seconds()).sum()
    }
}

/// Groups intervals by category (or app) and merges each group. Lanes are
/// ordered by key.
pub fn lanes(intervals: &[UsageInterval], key: LaneKey) -> Vec<Lane> {
    let mut groups: BTreeMap<&str, Vec<&UsageInterval>> = BTreeMap::new();
    for i in intervals {
        let k = match key {
            LaneKey::Category => i.category.as_str(),
            LaneKey::App => i.app.as_str(),
        };
        groups.entry(k).or_default().push(i);
    }

    groups
        .into_iter()
        .map(|(k, members)| {
            let mut apps: Vec<String> = Vec::new();
            for m in &members {
                if !apps.contains(&m.app) {
                    apps.push(m.app.clone());
                }
            }
            Lane {
                key: k.to_string(),
                category: members[0].category.clone(),
                apps,
                spans: merge_spans(
                    members
                        .iter()
                        .map(|i| Span {
                            start: i.start,
                            end: i.end,
                        })
                        .collect(),
                ),
            }
        })
        .collect()
}

/// Position of an instant on a day that starts at `day_start_hour` instead
/// of midnight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VirtualDayOffset {
    pub virtual_date: Date,
    /// Hours since the virtual day began, in `[0, 24)`.
    pub hours: f64,
}

/// Anything before `day_start_hour` (wall clock of the instant's offset)
/// belongs to the previous virtual day.
pub fn to_virtual_day_offset(instant: OffsetDateTime, day_start_hour: u8) -> VirtualDayOffset {
    let start = day_start_hour.min(23);
    let hour = f64::from(instant.hour())
        + f64::from(instant.minute()) / 60.0
        + f64::from(instant.second()) / 3600.0;
    let date = instant.date();
    let virtual_date = if instant.hour() < start {
        date.previous_day().unwrap_or(date)
    } else {
        date
    };
    VirtualDayOffset {
        virtual_date,
        hours: (hour - f64::from(start)).rem_euclid(24.0),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GanttBar {
    pub app: String,
    pub category: String,
    pub color: &'static str,
    pub start_ts: String,
    pub end_ts: String,
    pub virtual_date: String,
    pub start_offset_hours: f64,
    pub duration_hours: f64,
    pub start_label: String,
    pub end_label: String,
    pub duration_label: String,
}

/// Bars positioned on a virtual day starting at `day_start_hour`.
pub fn gantt_bars(
    intervals: &[UsageInterval],
    categorizer: &Categorizer,
    day_start_hour: u8,
) -> Vec<GanttBar> {
    intervals
        .iter()
        .map(|i| {
            let start = to_virtual_day_offset(i.start, day_start_hour);
            let end = to_virtual_day_offset(i.end, day_start_hour);
            let duration_hours = (end.hours - start.hours).rem_euclid(24.0);
            GanttBar {
                app: i.app.clone(),
                category: i.category.clone(),
                color: categorizer.color_for(&i.app),
                start_ts: fmt_ts(i.start),
                end_ts: fmt_ts(i.end),
                virtual_date: start.virtual_date.to_string(),
                start_offset_hours: start.hours,
                duration_hours,
                start_label: fmt_clock(i.start),
                end_label: fmt_clock(i.end),
                duration_label: format_minutes(duration_hours * 60.0),
            }
        })
        .collect()
}
