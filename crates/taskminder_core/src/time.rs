//! Local-time helpers for display and statistics.
//!
//! Reminder comparisons stay on raw epoch milliseconds; only text shown to
//! the user and "due today" buckets use the device time zone.

use crate::model::task::Task;
use chrono::{DateTime, Days, Local, LocalResult, NaiveDate, TimeZone};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

fn to_local(epoch_ms: i64) -> Option<DateTime<Local>> {
    match Local.timestamp_millis_opt(epoch_ms) {
        LocalResult::Single(value) => Some(value),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}

fn local_midnight_ms(date: NaiveDate) -> Option<i64> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(value) => Some(value.timestamp_millis()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp_millis()),
        LocalResult::None => None,
    }
}

/// Epoch milliseconds of local midnight starting the day containing `epoch_ms`.
pub fn start_of_local_day(epoch_ms: i64) -> Option<i64> {
    local_midnight_ms(to_local(epoch_ms)?.date_naive())
}

/// Last millisecond of the local day containing `epoch_ms`.
pub fn end_of_local_day(epoch_ms: i64) -> Option<i64> {
    let next_day = to_local(epoch_ms)?
        .date_naive()
        .checked_add_days(Days::new(1))?;
    Some(local_midnight_ms(next_day)? - 1)
}

/// Whether `due_at` falls on the same local day as `now_ms`.
pub fn is_due_today(due_at: i64, now_ms: i64) -> bool {
    match (start_of_local_day(now_ms), end_of_local_day(now_ms)) {
        (Some(start), Some(end)) => (start..=end).contains(&due_at),
        _ => false,
    }
}

/// Formats a timestamp as local `YYYY-MM-DD HH:MM`.
pub fn format_local_datetime(epoch_ms: i64) -> String {
    to_local(epoch_ms)
        .map(|value| value.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|| format!("@{epoch_ms}"))
}

/// Body text for a reminder notification.
pub fn notification_body(task: &Task) -> String {
    if let Some(description) = task.description.as_deref() {
        return description.to_string();
    }
    match task.due_at {
        Some(due_at) => format!("Due {}", format_local_datetime(due_at)),
        None => "Task reminder".to_string(),
    }
}
