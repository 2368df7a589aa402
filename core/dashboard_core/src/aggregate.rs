//! Window selection and per-app / per-category usage totals.

use std::{cmp::Ordering, collections::HashMap};

use serde::Serialize;
use time::{Date, UtcOffset};
use tracing::{debug, warn};

use crate::{
    category::Categorizer,
    materialize::{materialize_record, UsageInterval},
    model::ActivityLogRecord,
    zone::days_before,
};

/// A contiguous run of local calendar days, inclusive at both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateWindow {
    /// The `n` days before today; today is excluded.
    EndingYesterday(u32),
    /// The `n` days ending with today.
    Trailing(u32),
    Day(Date),
}

impl DateWindow {
    /// The dashboard's day toggle: `1` means yesterday, larger values mean
    /// that many days including today.
    pub fn from_days(days: u32) -> Self {
        if days <= 1 {
            DateWindow::EndingYesterday(1)
        } else {
            DateWindow::Trailing(days)
        }
    }

    pub fn bounds(self, today: Date) -> (Date, Date) {
        match self {
            DateWindow::EndingYesterday(n) => {
                (days_before(today, i64::from(n.max(1))), days_before(today, 1))
            }
            DateWindow::Trailing(n) => (days_before(today, i64::from(n.max(1)) - 1), today),
            DateWindow::Day(d) => (d, d),
        }
    }

    pub fn contains(self, today: Date, day: Date) -> bool {
        let (start, end) = self.bounds(today);
        day >= start && day <= end
    }
}

fn in_window<'a>(
    records: &'a [ActivityLogRecord],
    window: DateWindow,
    today: Date,
) -> Vec<&'a ActivityLogRecord> {
    let out: Vec<&ActivityLogRecord> = records
        .iter()
        .filter(|r| r.day().is_some_and(|d| window.contains(today, d)))
        .collect();
    debug!("{window:?}: {} of {} records in window", out.len(), records.len());
    out
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedUsage {
    pub app: String,
    pub minutes: f64,
    pub percentage: f64,
    pub category: String,
    pub category_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryUsage {
    pub category: String,
    pub minutes: f64,
    pub percentage: f64,
}

/// Minutes per app, in first-seen order.
fn minutes_by_app<'a>(records: &[&'a ActivityLogRecord]) -> Vec<(&'a str, f64)> {
    let mut order: Vec<(&str, f64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for &r in records {
        if !r.minutes.is_finite() {
            continue;
        }
        match index.get(r.app.as_str()) {
            Some(&i) => order[i].1 += r.minutes,
            None => {
                index.insert(r.app.as_str(), order.len());
                order.push((r.app.as_str(), r.minutes));
            }
        }
    }
    order
}

fn by_minutes_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Ranked usage for the window, most-used app first; ties keep input order.
/// An empty window (or one with no minutes) yields an empty list.
pub fn aggregate_usage(
    records: &[ActivityLogRecord],
    window: DateWindow,
    today: Date,
    categorizer: &Categorizer,
) -> Vec<AggregatedUsage> {
    let apps = minutes_by_app(&in_window(records, window, today));
    let total: f64 = apps.iter().map(|(_, m)| m).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut by_category: HashMap<&str, f64> = HashMap::new();
    for (app, minutes) in &apps {
        *by_category.entry(categorizer.category(app)).or_insert(0.0) += minutes;
    }

    let mut out: Vec<AggregatedUsage> = apps
        .iter()
        .map(|&(app, minutes)| {
            let category = categorizer.category(app);
            let category_minutes = by_category.get(category).copied().unwrap_or(0.0);
            AggregatedUsage {
                app: app.to_string(),
                minutes,
                percentage: minutes / total * 100.0,
                category: category.to_string(),
                category_percentage: category_minutes / total * 100.0,
            }
        })
        .collect();
    out.sort_by(|a, b| by_minutes_desc(a.minutes, b.minutes));
    out
}

/// Per-category totals for the pie view, largest first.
pub fn category_breakdown(
    records: &[ActivityLogRecord],
    window: DateWindow,
    today: Date,
    categorizer: &Categorizer,
) -> Vec<CategoryUsage> {
    let mut order: Vec<CategoryUsage> = Vec::new();
    for usage in aggregate_usage(records, window, today, categorizer) {
        match order.iter_mut().find(|c| c.category == usage.category) {
            Some(c) => c.minutes += usage.minutes,
            None => order.push(CategoryUsage {
                category: usage.category,
                minutes: usage.minutes,
                percentage: usage.category_percentage,
            }),
        }
    }
    order.sort_by(|a, b| by_minutes_desc(a.minutes, b.minutes));
    order
}

/// Intervals for the Gantt view plus how many records had to be skipped.
#[derive(Clone, Debug, Default)]
pub struct GanttFeed {
    pub intervals: Vec<UsageInterval>,
    pub records_seen: usize,
    pub records_skipped: usize,
}

pub fn gantt_feed(
    records: &[ActivityLogRecord],
    window: DateWindow,
    today: Date,
    categorizer: &Categorizer,
    zone: Option<UtcOffset>,
) -> GanttFeed {
    let mut feed = GanttFeed::default();
    for record in in_window(records, window, today) {
        feed.records_seen += 1;
        match materialize_record(record, categorizer, zone) {
            Ok(intervals) => feed.intervals.extend(intervals),
            Err(err) => {
                warn!(
                    "skip timeline for {} on {}: {err}",
                    record.app, record.date
                );
                feed.records_skipped += 1;
            }
        }
    }
    debug!(
        "gantt feed: {} intervals from {} records ({} skipped)",
        feed.intervals.len(),
        feed.records_seen,
        feed.records_skipped
    );
    feed
}

/// `"Xh Ym"` (or `"Ym"` under an hour) for a minute count. Hours are floored
/// and the remainder rounded on its own, so `119.7` reads `1h 60m`.
pub fn format_minutes(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return "0m".to_string();
    }
    let hours = (minutes / 60.0).floor() as i64;
    let rest = (minutes % 60.0).round() as i64;
    if hours > 0 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::parse_date;

    fn rec(date: &str, app: &str, minutes: f64) -> ActivityLogRecord {
        ActivityLogRecord {
            id: None,
            date: date.to_string(),
            app: app.to_string(),
            total_duration: String::new(),
            session_count: 1,
            timeline: String::new(),
            minutes,
        }
    }

    fn today() -> Date {
        parse_date("2024-11-20").unwrap()
    }

    #[test]
    fn window_bounds() {
        let t = today();
        let d = |s: &str| parse_date(s).unwrap();
        assert_eq!(DateWindow::from_days(1).bounds(t), (d("2024-11-19"), d("2024-11-19")));
        assert_eq!(DateWindow::from_days(7).bounds(t), (d("2024-11-14"), d("2024-11-20")));
        assert_eq!(
            DateWindow::EndingYesterday(7).bounds(t),
            (d("2024-11-13"), d("2024-11-19"))
        );
        assert_eq!(
            DateWindow::Day(d("2024-10-01")).bounds(t),
            (d("2024-10-01"), d("2024-10-01"))
        );
    }

    #[test]
    fn same_category_share_and_split() {
        let records = vec![
            rec("2024-11-19", "Cursor", 30.0),
            rec("2024-11-19", "Terminal", 10.0),
        ];
        let out = aggregate_usage(&records, DateWindow::from_days(1), today(), &Categorizer::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].app, "Cursor");
        assert_eq!(out[0].percentage, 75.0);
        assert_eq!(out[1].percentage, 25.0);
        assert_eq!(out[0].category_percentage, 100.0);
        assert_eq!(out[1].category_percentage, 100.0);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let records = vec![
            rec("2024-11-19", "Cursor", 13.3),
            rec("2024-11-19", "Slack", 7.1),
            rec("2024-11-18", "netflix.com", 41.9),
            rec("2024-11-17", "Cursor", 2.2),
            rec("2024-11-20", "Mystery", 0.7),
            rec("2024-11-01", "Cursor", 500.0),
        ];
        let c = Categorizer::default();
        let out = aggregate_usage(&records, DateWindow::Trailing(7), today(), &c);
        let sum: f64 = out.iter().map(|u| u.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-6);

        for u in &out {
            let same: f64 = out
                .iter()
                .filter(|o| o.category == u.category)
                .map(|o| o.percentage)
                .sum();
            assert!((same - u.category_percentage).abs() < 1e-6);
        }

        let cursor = out.iter().find(|u| u.app == "Cursor").unwrap();
        assert!((cursor.minutes - 15.5).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_input_order() {
        let records = vec![
            rec("2024-11-19", "B", 10.0),
            rec("2024-11-19", "A", 10.0),
            rec("2024-11-19", "C", 20.0),
        ];
        let out = aggregate_usage(&records, DateWindow::from_days(1), today(), &Categorizer::default());
        let apps: Vec<&str> = out.iter().map(|u| u.app.as_str()).collect();
        assert_eq!(apps, vec!["C", "B", "A"]);
    }

    #[test]
    fn empty_or_zero_window_is_empty() {
        let c = Categorizer::default();
        assert!(aggregate_usage(&[], DateWindow::from_days(1), today(), &c).is_empty());
        let zero = vec![rec("2024-11-19", "Cursor", 0.0)];
        assert!(aggregate_usage(&zero, DateWindow::from_days(1), today(), &c).is_empty());
        let outside = vec![rec("2024-11-20", "Cursor", 5.0)];
        assert!(aggregate_usage(&outside, DateWindow::from_days(1), today(), &c).is_empty());
    }

    #[test]
    fn breakdown_groups_categories() {
        let records = vec![
            rec("2024-11-19", "Cursor", 30.0),
            rec("2024-11-19", "Terminal", 10.0),
            rec("2024-11-19", "Slack", 60.0),
        ];
        let out = category_breakdown(&records, DateWindow::from_days(1), today(), &Categorizer::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].category, "Communication");
        assert_eq!(out[1].category, "Productivity");
        assert_eq!(out[1].minutes, 40.0);
        assert_eq!(out[1].percentage, 40.0);
    }

    #[test]
    fn gantt_feed_skips_broken_records_only() {
        let mut good = rec("2024-11-19", "Cursor", 1.0);
        good.timeline = "['timestamp': Timestamp('2024-11-19T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]".to_string();
        let mut bad = rec("2024-11-19", "Slack", 1.0);
        bad.timeline = "['timestamp': Timestamp('garbage'), 'duration': Timedelta('0 days 00:05:00')]".to_string();
        let mut other_day = rec("2024-11-10", "Cursor", 1.0);
        other_day.timeline = good.timeline.clone();

        let feed = gantt_feed(
            &[good, bad, other_day],
            DateWindow::from_days(1),
            today(),
            &Categorizer::default(),
            None,
        );
        assert_eq!(feed.records_seen, 2);
        assert_eq!(feed.records_skipped, 1);
        assert_eq!(feed.intervals.len(), 1);
        assert_eq!(feed.intervals[0].category, "Productivity");
    }

    #[test]
    fn out_of_range_session_skips_only_its_record() {
        let mut good = rec("2024-11-19", "Cursor", 1.0);
        good.timeline = "['timestamp': Timestamp('2024-11-19T10:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]".to_string();
        let mut huge = rec("2024-11-19", "Slack", 1.0);
        huge.timeline = "['timestamp': Timestamp('2024-11-19T10:00:00+0000'), 'duration': Timedelta('3000000 days 00:00:00')]".to_string();
        let mut edge = rec("2024-11-19", "Terminal", 1.0);
        edge.timeline = "['timestamp': Timestamp('9999-12-31T23:00:00+0000'), 'duration': Timedelta('0 days 00:01:00')]".to_string();

        let zone = UtcOffset::from_hms(14, 0, 0).unwrap();
        let feed = gantt_feed(
            &[good, huge, edge],
            DateWindow::from_days(1),
            today(),
            &Categorizer::default(),
            Some(zone),
        );
        assert_eq!(feed.records_seen, 3);
        assert_eq!(feed.records_skipped, 2);
        assert_eq!(feed.intervals.len(), 1);
        assert_eq!(feed.intervals[0].app, "Cursor");
        assert_eq!(feed.intervals[0].seconds(), 60);
    }

    #[test]
    fn minute_labels() {
        assert_eq!(format_minutes(0.0), "0m");
        assert_eq!(format_minutes(45.4), "45m");
        assert_eq!(format_minutes(60.0), "1h 0m");
        assert_eq!(format_minutes(135.0), "2h 15m");
        assert_eq!(format_minutes(119.7), "1h 60m");
        assert_eq!(format_minutes(59.6), "60m");
    }
}
