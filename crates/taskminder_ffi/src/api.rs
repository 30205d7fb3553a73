//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose task and reminder use cases to Dart via FRB.
//! - Hand back the platform commands each call produced so the host can run
//!   them against the alarm manager, work queue and notification services.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Calls are serialized; the commands in a response belong to that call only.
//! - Ringing state lives in one process-scoped reminder runtime.

use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use taskminder_core::db::open_db;
use taskminder_core::reminder::facility::NotificationAction;
use taskminder_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    DispatchOutcome, JobKind, JobOutcome, JobPayload, NewTask, PlatformCommand, Priority,
    ReminderDispatcher, ReminderRuntime, RepoResult, SqliteTaskRepository, SystemClock, Task,
    TaskFilter, TaskId, TaskService, TaskStatus,
};

const DB_FILE_NAME: &str = "taskminder.sqlite3";
const DB_PATH_ENV: &str = "TASKMINDER_DB_PATH";

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static RUNTIME: OnceLock<ReminderRuntime> = OnceLock::new();
static CALL_LOCK: Mutex<()> = Mutex::new(());

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: `trace|debug|info|warn|error`, case-insensitive.
/// - `log_dir`: absolute directory for rolling log files.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Flat record of one platform side effect the host must perform.
///
/// `kind` is one of `set_exact_alarm|set_inexact_alarm|cancel_alarm|
/// enqueue_job|cancel_jobs|show_notification|cancel_notification|
/// start_persistent_alert|stop_persistent_alert`. Fields not used by a kind
/// are `None`/empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformCommandItem {
    pub kind: String,
    pub task_id: Option<i64>,
    /// Alarm wall-clock time in epoch milliseconds.
    pub fire_at: Option<i64>,
    pub delay_ms: Option<i64>,
    /// Job tag used for enqueue and bulk cancel.
    pub tag: Option<String>,
    /// `backup|staggered|immediate`.
    pub job_kind: Option<String>,
    pub reminder_at: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub actions: Vec<String>,
    pub duration_ms: Option<i64>,
}

/// Task projection for list and detail screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<i64>,
    /// 1 = low, 2 = medium, 3 = high.
    pub priority_level: i64,
    /// `pending|completed`.
    pub status: String,
    pub reminder_at: Option<i64>,
    pub created_at: i64,
}

/// Response envelope for task mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    /// Affected task id, when the call targets one task.
    pub task_id: Option<i64>,
    pub message: String,
    /// Platform commands to execute in order, also on failure.
    pub commands: Vec<PlatformCommandItem>,
}

/// Response envelope for task listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Response envelope for a single task lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetailResponse {
    pub ok: bool,
    pub item: Option<TaskItem>,
    pub message: String,
}

/// Home-screen counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatsResponse {
    pub ok: bool,
    pub total: u32,
    pub pending: u32,
    pub completed: u32,
    pub high_priority: u32,
    pub overdue: u32,
    pub due_today: u32,
    pub message: String,
}

/// Response envelope for reminder triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderResponse {
    pub ok: bool,
    /// Tasks surfaced to the user by this call.
    pub delivered: u32,
    /// Lower-ranked tasks queued for staggered delivery.
    pub staggered: u32,
    pub message: String,
    pub commands: Vec<PlatformCommandItem>,
}

/// Mirrors the host's exact-alarm permission into core.
///
/// # FFI contract
/// - Call at startup and whenever the permission may have changed.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_set_exact_alarms_allowed(allowed: bool) {
    runtime().outbox().set_exact_alarms_allowed(allowed);
}

/// Creates a pending task and registers its reminder.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `priority_level` must be 1..=3.
#[flutter_rust_bridge::frb(sync)]
pub fn task_create(
    title: String,
    description: Option<String>,
    due_at: Option<i64>,
    priority_level: i64,
    reminder_at: Option<i64>,
) -> TaskActionResponse {
    let result = with_task_service(|service| {
        let input = NewTask {
            title,
            description,
            due_at,
            priority: Priority::from_level(priority_level)?,
            reminder_at,
        };
        service.add_task(input)
    });
    action_response("task_create", "Task created.", result)
}

/// Replaces the editable fields of a task and re-syncs its reminder.
///
/// Status and creation time are kept from the stored row.
#[flutter_rust_bridge::frb(sync)]
pub fn task_update(
    task_id: i64,
    title: String,
    description: Option<String>,
    due_at: Option<i64>,
    priority_level: i64,
    reminder_at: Option<i64>,
) -> TaskActionResponse {
    let id = TaskId(task_id);
    let result = with_task_service(|service| {
        let priority = Priority::from_level(priority_level)?;
        let stored = service
            .get_task(id)?
            .ok_or(taskminder_core::RepoError::NotFound(id))?;
        let task = Task {
            title,
            description,
            due_at,
            priority,
            reminder_at,
            ..stored
        };
        service.update_task(&task).map(|()| id)
    });
    action_response("task_update", "Task updated.", result)
}

/// Sets `pending` or `completed`; completing cancels the reminder.
#[flutter_rust_bridge::frb(sync)]
pub fn task_set_status(task_id: i64, status: String) -> TaskActionResponse {
    let id = TaskId(task_id);
    let result = with_task_service(|service| {
        let status = TaskStatus::parse(status.trim())?;
        service.set_status(id, status).map(|()| id)
    });
    action_response("task_set_status", "Task status updated.", result)
}

/// Flips the completion state of a task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_toggle(task_id: i64) -> TaskActionResponse {
    let id = TaskId(task_id);
    let result = with_task_service(|service| service.toggle_completion(id).map(|_| id));
    action_response("task_toggle", "Task toggled.", result)
}

/// Deletes a task after cancelling its reminder.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(task_id: i64) -> TaskActionResponse {
    let id = TaskId(task_id);
    let result = with_task_service(|service| service.delete_task(id).map(|()| id));
    action_response("task_delete", "Task deleted.", result)
}

/// Deletes every completed task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete_completed() -> TaskActionResponse {
    let (result, commands) = with_task_service(|service| service.delete_completed());
    match result {
        Ok(removed) => TaskActionResponse {
            ok: true,
            task_id: None,
            message: format!("Deleted {removed} completed task(s)."),
            commands,
        },
        Err(err) => TaskActionResponse {
            ok: false,
            task_id: None,
            message: format!("task_delete_completed failed: {err}"),
            commands,
        },
    }
}

/// Lists tasks ordered by due date with undated tasks last.
///
/// # FFI contract
/// - `None` filter fields do not constrain the result.
/// - `overdue_only` restricts to pending tasks due before now.
#[flutter_rust_bridge::frb(sync)]
pub fn task_list(
    status: Option<String>,
    priority_level: Option<i64>,
    has_due_date: Option<bool>,
    has_reminder: Option<bool>,
    search: Option<String>,
    overdue_only: bool,
) -> TaskListResponse {
    let (result, _) = with_task_service(|service| {
        let filter = TaskFilter {
            status: status.as_deref().map(TaskStatus::parse).transpose()?,
            priority: priority_level.map(Priority::from_level).transpose()?,
            has_due_date,
            has_reminder,
            search: search.filter(|text| !text.trim().is_empty()),
            overdue_at: overdue_only.then(|| runtime().clock().now_ms()),
        };
        service.list_tasks(&filter)
    });
    match result {
        Ok(tasks) => {
            let items = tasks.iter().filter_map(to_task_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No tasks.".to_string()
            } else {
                format!("Found {} task(s).", items.len())
            };
            TaskListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => TaskListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("task_list failed: {err}"),
        },
    }
}

/// Loads one task by id.
#[flutter_rust_bridge::frb(sync)]
pub fn task_get(task_id: i64) -> TaskDetailResponse {
    let (result, _) = with_task_service(|service| service.get_task(TaskId(task_id)));
    match result {
        Ok(Some(task)) => TaskDetailResponse {
            ok: true,
            item: to_task_item(&task),
            message: "Task loaded.".to_string(),
        },
        Ok(None) => TaskDetailResponse {
            ok: false,
            item: None,
            message: format!("task not found: {task_id}"),
        },
        Err(err) => TaskDetailResponse {
            ok: false,
            item: None,
            message: format!("task_get failed: {err}"),
        },
    }
}

/// Computes home-screen counters at the current time.
#[flutter_rust_bridge::frb(sync)]
pub fn task_statistics() -> TaskStatsResponse {
    let now = runtime().clock().now_ms();
    let (result, _) = with_task_service(|service| service.statistics(now));
    match result {
        Ok(stats) => TaskStatsResponse {
            ok: true,
            total: to_u32(stats.total),
            pending: to_u32(stats.pending),
            completed: to_u32(stats.completed),
            high_priority: to_u32(stats.high_priority),
            overdue: to_u32(stats.overdue),
            due_today: to_u32(stats.due_today),
            message: String::new(),
        },
        Err(err) => TaskStatsResponse {
            ok: false,
            total: 0,
            pending: 0,
            completed: 0,
            high_priority: 0,
            overdue: 0,
            due_today: 0,
            message: format!("task_statistics failed: {err}"),
        },
    }
}

/// Handles an exact or inexact alarm firing.
///
/// # FFI contract
/// - `fired_at`: reminder time carried by the alarm; `None` or `<= 0` means now.
/// - Delivers the highest-ranked due task and staggers the rest.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_on_alarm_fired(fired_at: Option<i64>) -> ReminderResponse {
    let (result, commands) =
        with_dispatcher(|dispatcher| Ok(dispatcher.on_alarm_fired(fired_at)));
    match result {
        Ok(DispatchOutcome::Idle) => {
            reminder_response(true, 0, 0, "Nothing due.".to_string(), commands)
        }
        Ok(DispatchOutcome::Dispatched {
            report,
            staggered,
            failed,
            ..
        }) => reminder_response(
            true,
            u32::from(report.is_delivered()),
            to_u32(staggered.len()),
            format!("Dispatched; {} stagger failure(s).", failed.len()),
            commands,
        ),
        Ok(DispatchOutcome::Aborted(reason)) => reminder_response(
            false,
            0,
            0,
            format!("reminder_on_alarm_fired aborted: {reason}"),
            commands,
        ),
        Err(message) => reminder_response(false, 0, 0, message, commands),
    }
}

/// Handles a backup, staggered or immediate job.
///
/// # FFI contract
/// - `kind`: `backup|staggered|immediate`.
/// - Tasks completed or deleted since enqueue are skipped.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_on_job_fired(task_id: i64, reminder_at: i64, kind: String) -> ReminderResponse {
    let Some(kind) = JobKind::parse(kind.trim()) else {
        return reminder_response(
            false,
            0,
            0,
            format!("unknown job kind `{}`", kind.trim()),
            Vec::new(),
        );
    };
    let payload = JobPayload {
        task_id: TaskId(task_id),
        reminder_at,
        kind,
    };
    let (result, commands) = with_dispatcher(|dispatcher| Ok(dispatcher.on_job_fired(&payload)));
    match result {
        Ok(JobOutcome::Delivered(report)) => reminder_response(
            true,
            u32::from(report.is_delivered()),
            0,
            "Reminder delivered.".to_string(),
            commands,
        ),
        Ok(JobOutcome::SkippedNotPending) => {
            reminder_response(true, 0, 0, "Task no longer pending.".to_string(), commands)
        }
        Ok(JobOutcome::SkippedMissing) => {
            reminder_response(true, 0, 0, "Task no longer exists.".to_string(), commands)
        }
        Ok(JobOutcome::Failed(reason)) => reminder_response(
            false,
            0,
            0,
            format!("reminder_on_job_fired failed: {reason}"),
            commands,
        ),
        Err(message) => reminder_response(false, 0, 0, message, commands),
    }
}

/// Delivers every overdue pending reminder; call once per process start.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_check_overdue_on_startup() -> ReminderResponse {
    let (result, commands) =
        with_dispatcher(|dispatcher| Ok(dispatcher.check_overdue_on_startup()));
    match result {
        Ok(delivered) => reminder_response(
            true,
            to_u32(delivered),
            0,
            format!("Recovered {delivered} overdue reminder(s)."),
            commands,
        ),
        Err(message) => reminder_response(false, 0, 0, message, commands),
    }
}

/// Re-registers alarm and backup job for every future pending reminder.
///
/// # FFI contract
/// - Call once per process start, before `reminder_check_overdue_on_startup`.
/// - `delivered` is always 0; nothing is shown to the user.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_restore_on_startup() -> ReminderResponse {
    let (result, commands) = with_task_service(|service| service.reschedule_pending_reminders());
    match result {
        Ok(rescheduled) => reminder_response(
            true,
            0,
            0,
            format!("Re-registered {rescheduled} pending reminder(s)."),
            commands,
        ),
        Err(message) => reminder_response(false, 0, 0, message, commands),
    }
}

/// Stops the ringing alert of `task_id` and clears its notification.
#[flutter_rust_bridge::frb(sync)]
pub fn reminder_stop_active(task_id: i64) -> ReminderResponse {
    let _guard = call_guard();
    let stopped = runtime().delivery().stop_active_delivery(TaskId(task_id));
    let commands = drain_commands();
    let message = if stopped {
        "Alert stopped."
    } else {
        "No alert was ringing for this task."
    };
    reminder_response(true, 0, 0, message.to_string(), commands)
}

fn runtime() -> &'static ReminderRuntime {
    RUNTIME.get_or_init(|| ReminderRuntime::with_default_policy(true, Arc::new(SystemClock)))
}

fn call_guard() -> MutexGuard<'static, ()> {
    CALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

/// Runs `f` against a fresh connection and returns its result together with
/// every platform command it produced.
fn with_task_service<T>(
    f: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> RepoResult<T>,
) -> (Result<T, String>, Vec<PlatformCommandItem>) {
    let _guard = call_guard();
    let result = open_db(resolve_db_path())
        .map_err(|err| format!("task DB open failed: {err}"))
        .and_then(|conn| {
            let service = runtime().task_service(SqliteTaskRepository::new(&conn));
            f(&service).map_err(|err| err.to_string())
        });
    (result, drain_commands())
}

fn with_dispatcher<T>(
    f: impl FnOnce(&ReminderDispatcher<SqliteTaskRepository<'_>>) -> Result<T, String>,
) -> (Result<T, String>, Vec<PlatformCommandItem>) {
    let _guard = call_guard();
    let result = open_db(resolve_db_path())
        .map_err(|err| format!("task DB open failed: {err}"))
        .and_then(|conn| {
            let dispatcher = runtime().dispatcher(SqliteTaskRepository::new(&conn));
            f(&dispatcher)
        });
    (result, drain_commands())
}

fn drain_commands() -> Vec<PlatformCommandItem> {
    runtime()
        .outbox()
        .drain()
        .into_iter()
        .map(to_command_item)
        .collect()
}

fn action_response(
    operation: &str,
    message: &str,
    (result, commands): (Result<TaskId, String>, Vec<PlatformCommandItem>),
) -> TaskActionResponse {
    match result {
        Ok(id) => TaskActionResponse {
            ok: true,
            task_id: Some(id.get()),
            message: message.to_string(),
            commands,
        },
        Err(err) => {
            warn!("event=ffi_call module=ffi status=error op={operation}");
            TaskActionResponse {
                ok: false,
                task_id: None,
                message: format!("{operation} failed: {err}"),
                commands,
            }
        }
    }
}

fn reminder_response(
    ok: bool,
    delivered: u32,
    staggered: u32,
    message: String,
    commands: Vec<PlatformCommandItem>,
) -> ReminderResponse {
    ReminderResponse {
        ok,
        delivered,
        staggered,
        message,
        commands,
    }
}

fn to_task_item(task: &Task) -> Option<TaskItem> {
    Some(TaskItem {
        id: task.id?.get(),
        title: task.title.clone(),
        description: task.description.clone(),
        due_at: task.due_at,
        priority_level: task.priority.level(),
        status: task.status.as_str().to_string(),
        reminder_at: task.reminder_at,
        created_at: task.created_at,
    })
}

fn to_command_item(command: PlatformCommand) -> PlatformCommandItem {
    match command {
        PlatformCommand::SetExactAlarm(request) => PlatformCommandItem {
            kind: "set_exact_alarm".to_string(),
            task_id: Some(request.key.0.get()),
            fire_at: Some(request.fire_at),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::SetInexactAlarm(request) => PlatformCommandItem {
            kind: "set_inexact_alarm".to_string(),
            task_id: Some(request.key.0.get()),
            fire_at: Some(request.fire_at),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::CancelAlarm { task_id } => PlatformCommandItem {
            kind: "cancel_alarm".to_string(),
            task_id: Some(task_id.get()),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::EnqueueJob(job) => PlatformCommandItem {
            kind: "enqueue_job".to_string(),
            task_id: Some(job.payload.task_id.get()),
            delay_ms: Some(job.delay_ms),
            tag: Some(job.tag),
            job_kind: Some(job.payload.kind.as_str().to_string()),
            reminder_at: Some(job.payload.reminder_at),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::CancelJobs { tag } => PlatformCommandItem {
            kind: "cancel_jobs".to_string(),
            tag: Some(tag),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::ShowNotification(notification) => PlatformCommandItem {
            kind: "show_notification".to_string(),
            task_id: Some(notification.id),
            title: Some(notification.title),
            body: Some(notification.body),
            actions: notification
                .actions
                .into_iter()
                .map(action_label)
                .map(str::to_string)
                .collect(),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::CancelNotification { id } => PlatformCommandItem {
            kind: "cancel_notification".to_string(),
            task_id: Some(id),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::StartPersistentAlert(alert) => PlatformCommandItem {
            kind: "start_persistent_alert".to_string(),
            task_id: Some(alert.task_id.get()),
            title: Some(alert.title),
            body: Some(alert.body),
            duration_ms: Some(alert.duration_ms),
            ..PlatformCommandItem::default()
        },
        PlatformCommand::StopPersistentAlert { task_id } => PlatformCommandItem {
            kind: "stop_persistent_alert".to_string(),
            task_id: Some(task_id.get()),
            ..PlatformCommandItem::default()
        },
    }
}

fn action_label(action: NotificationAction) -> &'static str {
    match action {
        NotificationAction::Open => "open",
        NotificationAction::StopReminder => "stop_reminder",
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
