//! Platform facility ports consumed by the reminder policy.
//!
//! # Responsibility
//! - Describe the exact-alarm, deferred-job and notification services the
//!   host operating system provides.
//! - Keep request payloads plain data so hosts can marshal them freely.
//!
//! # Invariants
//! - Alarm registrations are keyed by task id; one task has at most one alarm.
//! - Job tags are stable per (task, kind) so cancellation never needs a handle.
//! - Notification ids equal task ids; hosts deduplicate on that id.

use crate::model::task::TaskId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure reported by a platform facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityError {
    /// The OS refused exact wake-up scheduling (missing capability).
    ExactAlarmDenied,
    /// The facility could not accept the request.
    Unavailable(String),
}

impl Display for FacilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactAlarmDenied => write!(f, "exact alarm scheduling denied by platform"),
            Self::Unavailable(message) => write!(f, "platform facility unavailable: {message}"),
        }
    }
}

impl Error for FacilityError {}

pub type FacilityResult<T> = Result<T, FacilityError>;

/// Alarm registration key; one per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlarmKey(pub TaskId);

/// Wake-up request handed to the alarm facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub key: AlarmKey,
    /// Wall-clock fire time in epoch milliseconds.
    pub fire_at: i64,
}

/// Why a deferred job exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Redundant copy of the primary alarm.
    Backup,
    /// Delayed delivery of a lower-ranked simultaneous reminder.
    Staggered,
    /// Zero-delay delivery for a reminder whose time has already passed.
    Immediate,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Backup, JobKind::Staggered, JobKind::Immediate];

    fn tag_prefix(self) -> &'static str {
        match self {
            Self::Backup => "task_reminder_",
            Self::Staggered => "staggered_reminder_",
            Self::Immediate => "immediate_reminder_",
        }
    }

    /// Stable job tag for this kind and task.
    pub fn tag(self, task_id: TaskId) -> String {
        format!("{}{}", self.tag_prefix(), task_id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Staggered => "staggered",
            Self::Immediate => "immediate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "backup" => Some(Self::Backup),
            "staggered" => Some(Self::Staggered),
            "immediate" => Some(Self::Immediate),
            _ => None,
        }
    }
}

/// Data carried by a deferred job back into the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub task_id: TaskId,
    pub reminder_at: i64,
    pub kind: JobKind,
}

/// Deferred job registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub delay_ms: i64,
    pub payload: JobPayload,
    pub tag: String,
}

impl JobRequest {
    pub fn new(delay_ms: i64, payload: JobPayload) -> Self {
        Self {
            delay_ms: delay_ms.max(0),
            tag: payload.kind.tag(payload.task_id),
            payload,
        }
    }
}

/// User action attached to a reminder notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    /// Opens the task detail; hosts call `stop_active_delivery` on open.
    Open,
    StopReminder,
}

/// Visible reminder notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Equals the task id.
    pub id: i64,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

/// Ongoing sound/vibration alert with its own stop control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentAlert {
    pub task_id: TaskId,
    pub title: String,
    pub body: String,
    /// Alert stops on its own after this many milliseconds.
    pub duration_ms: i64,
}

/// Exact wall-clock wake-up service.
pub trait AlarmFacility: Send + Sync {
    /// Whether the platform currently grants exact scheduling.
    fn can_schedule_exact(&self) -> bool;
    fn set_exact_wake(&self, request: AlarmRequest) -> FacilityResult<()>;
    /// Best-effort wake-up used when exact scheduling is unavailable.
    fn set_inexact_wake(&self, request: AlarmRequest) -> FacilityResult<()>;
    fn cancel(&self, key: AlarmKey) -> FacilityResult<()>;
}

/// Delay-based job queue that survives process restarts.
pub trait DeferredJobQueue: Send + Sync {
    /// Queues `request`, replacing a still-queued job with the same tag.
    fn enqueue(&self, request: JobRequest) -> FacilityResult<()>;
    /// Cancels every job carrying `tag`; unknown tags are a no-op.
    fn cancel_by_tag(&self, tag: &str) -> FacilityResult<()>;
}

/// Notification and foreground-alert presentation.
pub trait Notifier: Send + Sync {
    fn show(&self, notification: &Notification) -> FacilityResult<()>;
    fn cancel(&self, notification_id: i64) -> FacilityResult<()>;
    fn start_persistent_alert(&self, alert: &PersistentAlert) -> FacilityResult<()>;
    fn stop_persistent_alert(&self, task_id: TaskId) -> FacilityResult<()>;
}
