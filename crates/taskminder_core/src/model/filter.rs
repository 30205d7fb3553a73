//! Task list filter options.

use crate::model::task::{Priority, TaskStatus};
use serde::{Deserialize, Serialize};

/// Filter for listing tasks. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub has_due_date: Option<bool>,
    pub has_reminder: Option<bool>,
    /// Case-insensitive substring over title and description.
    pub search: Option<String>,
    /// When set, only pending tasks due strictly before this timestamp.
    pub overdue_at: Option<i64>,
}

impl TaskFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(TaskStatus::Pending),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            ..Self::default()
        }
    }

    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn with_reminders() -> Self {
        Self {
            has_reminder: Some(true),
            ..Self::default()
        }
    }

    pub fn overdue(now_ms: i64) -> Self {
        Self {
            overdue_at: Some(now_ms),
            ..Self::default()
        }
    }

    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..Self::default()
        }
    }
}
