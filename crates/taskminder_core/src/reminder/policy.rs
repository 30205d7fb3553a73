//! Reminder policy constants and due-task ranking.
//!
//! # Invariants
//! - Ranking is a stable sort: tasks with equal keys keep store order.
//! - A task without a due date ranks after every dated task of equal priority.

use crate::model::task::Task;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default spacing between staggered deliveries.
pub const DEFAULT_STAGGER_INTERVAL_MS: i64 = 25_000;
/// Default lifetime of a persistent (ringing) alert.
pub const DEFAULT_PERSISTENT_ALERT_MS: i64 = 60_000;

/// Tunable reminder dispatch constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderPolicy {
    /// The n-th remaining task of one firing is delayed `n * stagger_interval_ms`.
    pub stagger_interval_ms: i64,
    pub persistent_alert_ms: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            stagger_interval_ms: DEFAULT_STAGGER_INTERVAL_MS,
            persistent_alert_ms: DEFAULT_PERSISTENT_ALERT_MS,
        }
    }
}

impl ReminderPolicy {
    /// Rejects intervals that would collapse staggering or alerts.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.stagger_interval_ms <= 0 {
            return Err(PolicyError::NonPositive {
                field: "stagger_interval_ms",
                value: self.stagger_interval_ms,
            });
        }
        if self.persistent_alert_ms <= 0 {
            return Err(PolicyError::NonPositive {
                field: "persistent_alert_ms",
                value: self.persistent_alert_ms,
            });
        }
        Ok(())
    }

    /// Delay for the task at `rank` among the remaining (non-immediate) tasks.
    ///
    /// `rank` is zero-based, so the first remaining task waits one interval.
    pub fn stagger_delay_ms(&self, rank: usize) -> i64 {
        let steps = i64::try_from(rank).unwrap_or(i64::MAX).saturating_add(1);
        steps.saturating_mul(self.stagger_interval_ms)
    }
}

/// Invalid policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    NonPositive { field: &'static str, value: i64 },
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositive { field, value } => {
                write!(f, "reminder policy `{field}` must be positive, got {value}")
            }
        }
    }
}

impl Error for PolicyError {}

/// Orders due tasks for one firing.
///
/// Priority descending, then due date ascending (absent last), then creation
/// time ascending.
pub fn rank_due_tasks(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(compare_for_delivery);
    tasks
}

fn compare_for_delivery(left: &Task, right: &Task) -> Ordering {
    right
        .priority
        .cmp(&left.priority)
        .then_with(|| {
            let left_due = left.due_at.unwrap_or(i64::MAX);
            let right_due = right.due_at.unwrap_or(i64::MAX);
            left_due.cmp(&right_due)
        })
        .then_with(|| left.created_at.cmp(&right.created_at))
}
