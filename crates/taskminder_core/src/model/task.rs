//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by list, detail and reminder flows.
//! - Provide validated construction and closed priority/status sets.
//!
//! # Invariants
//! - `title` is never blank after validation.
//! - `priority` and `status` are always members of their closed enums.
//! - All timestamps are Unix epoch milliseconds compared as plain integers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Store-assigned task identifier.
///
/// Also used as the stable notification id, so duplicate deliveries of the
/// same task replace each other on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task priority, ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Numeric level persisted in storage (`1..=3`).
    pub fn level(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Parses a numeric level, rejecting anything outside `1..=3`.
    pub fn from_level(level: i64) -> Result<Self, TaskValidationError> {
        match level {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(TaskValidationError::InvalidPriority(other)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a case-insensitive label.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parses the persisted status string.
    pub fn parse(value: &str) -> Result<Self, TaskValidationError> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(TaskValidationError::InvalidStatus(other.to_string())),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

/// Boundary validation failures for task input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    BlankTitle,
    InvalidPriority(i64),
    InvalidStatus(String),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "task title cannot be empty"),
            Self::InvalidPriority(level) => {
                write!(f, "invalid priority level `{level}`; expected 1..=3")
            }
            Self::InvalidStatus(value) => {
                write!(f, "invalid task status `{value}`; expected pending|completed")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Input for creating a task through the validated constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<i64>,
    pub priority: Priority,
    pub reminder_at: Option<i64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// `None` until the store assigns an id on insert.
    pub id: Option<TaskId>,
    pub title: String,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub due_at: Option<i64>,
    pub priority: Priority,
    pub status: TaskStatus,
    /// Epoch milliseconds at which the reminder should fire.
    pub reminder_at: Option<i64>,
    /// Epoch milliseconds; last tie-break when ranking simultaneous reminders.
    pub created_at: i64,
}

impl Task {
    /// Builds a pending task from creation input.
    ///
    /// # Errors
    /// - `BlankTitle` when the title is empty after trimming.
    pub fn new(input: NewTask, created_at: i64) -> Result<Self, TaskValidationError> {
        let mut task = Self {
            id: None,
            title: input.title,
            description: input.description,
            due_at: input.due_at,
            priority: input.priority,
            status: TaskStatus::Pending,
            reminder_at: input.reminder_at,
            created_at,
        };
        task.normalize();
        task.validate()?;
        Ok(task)
    }

    /// Trims text fields in place.
    ///
    /// Title whitespace runs collapse to one space; a blank description
    /// becomes `None`.
    pub fn normalize(&mut self) {
        self.title = WHITESPACE_RE
            .replace_all(self.title.trim(), " ")
            .into_owned();
        self.description = self
            .description
            .take()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    /// Checks the invariants required before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Pending tasks with a reminder are the ones the dispatcher cares about.
    pub fn has_active_reminder(&self) -> bool {
        self.is_pending() && self.reminder_at.is_some()
    }

    /// Whether a pending task's due date lies strictly before `now_ms`.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.is_pending() && self.due_at.is_some_and(|due| due < now_ms)
    }
}
