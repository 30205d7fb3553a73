//! Task use-case service.
//!
//! # Responsibility
//! - Provide validated create/update/status/delete entry points.
//! - Keep reminder registrations in step with task mutations when a
//!   `ReminderScheduler` is attached.
//!
//! # Invariants
//! - Service APIs never bypass repository validation.
//! - A completed or deleted task has no live reminder registration.
//! - Unknown ids surface as `RepoError::NotFound`, never as a panic.

use crate::model::filter::TaskFilter;
use crate::model::task::{NewTask, Priority, Task, TaskId, TaskStatus};
use crate::reminder::clock::Clock;
use crate::reminder::scheduler::ReminderScheduler;
use crate::repo::task_repo::{RepoError, RepoResult, TaskRepository};
use crate::time::is_due_today;
use log::info;
use std::sync::Arc;

/// Aggregate counters for the home screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStatistics {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub high_priority: usize,
    pub overdue: usize,
    pub due_today: usize,
}

/// Use-case service wrapper for task operations.
pub struct TaskService<R: TaskRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    reminders: Option<ReminderScheduler>,
}

impl<R: TaskRepository> TaskService<R> {
    /// Creates a service without reminder wiring.
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            reminders: None,
        }
    }

    /// Creates a service that keeps reminder registrations in sync.
    pub fn with_reminders(repo: R, clock: Arc<dyn Clock>, reminders: ReminderScheduler) -> Self {
        Self {
            repo,
            clock,
            reminders: Some(reminders),
        }
    }

    /// Validates and inserts a new pending task.
    ///
    /// # Contract
    /// - `created_at` is taken from the service clock.
    /// - A set reminder is scheduled right after insert.
    pub fn add_task(&self, input: NewTask) -> RepoResult<TaskId> {
        let task = Task::new(input, self.clock.now_ms())?;
        let id = self.repo.insert_task(&task)?;
        info!(
            "event=task_create module=service status=ok task_id={} priority={} has_reminder={}",
            id,
            task.priority.label(),
            task.reminder_at.is_some()
        );
        self.sync_reminder(id, task.status, task.reminder_at);
        Ok(id)
    }

    /// Replaces an existing task and re-syncs its reminder.
    pub fn update_task(&self, task: &Task) -> RepoResult<()> {
        let id = task.id.ok_or(RepoError::Unsaved)?;
        let mut task = task.clone();
        task.normalize();
        task.validate()?;
        self.require(id)?;
        self.repo.update_task(&task)?;
        self.sync_reminder(id, task.status, task.reminder_at);
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.repo.get_task(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        self.repo.list_tasks(filter)
    }

    /// Sets the status; completing cancels the reminder, reopening restores it.
    pub fn set_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()> {
        let task = self.require(id)?;
        self.repo.update_status(id, status)?;
        info!(
            "event=task_status module=service status=ok task_id={} task_status={}",
            id,
            status.as_str()
        );
        self.sync_reminder(id, status, task.reminder_at);
        Ok(())
    }

    /// Flips pending/completed and returns the new status.
    pub fn toggle_completion(&self, id: TaskId) -> RepoResult<TaskStatus> {
        let task = self.require(id)?;
        let next = task.status.toggled();
        self.set_status(id, next)?;
        Ok(next)
    }

    pub fn set_priority(&self, id: TaskId, priority: Priority) -> RepoResult<()> {
        let mut task = self.require(id)?;
        task.priority = priority;
        self.repo.update_task(&task)
    }

    /// Sets or clears the reminder timestamp and updates its registration.
    pub fn set_reminder(&self, id: TaskId, reminder_at: Option<i64>) -> RepoResult<()> {
        let mut task = self.require(id)?;
        task.reminder_at = reminder_at;
        self.repo.update_task(&task)?;
        self.sync_reminder(id, task.status, reminder_at);
        Ok(())
    }

    /// Cancels the reminder, then deletes the task.
    pub fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        self.require(id)?;
        if let Some(reminders) = &self.reminders {
            reminders.cancel(id);
        }
        self.repo.delete_task(id)?;
        info!("event=task_delete module=service status=ok task_id={}", id);
        Ok(())
    }

    /// Bulk-deletes completed tasks and returns how many were removed.
    pub fn delete_completed(&self) -> RepoResult<usize> {
        if let Some(reminders) = &self.reminders {
            for id in self.repo.list_completed_ids()? {
                reminders.cancel(id);
            }
        }
        let removed = self.repo.delete_completed()?;
        info!(
            "event=task_delete_completed module=service status=ok removed={}",
            removed
        );
        Ok(removed)
    }

    /// Re-registers every pending reminder that still lies in the future.
    ///
    /// Platform alarms do not survive a reboot, so the host calls this at
    /// process start. Reminders at or before now are left to
    /// `ReminderDispatcher::check_overdue_on_startup`. Returns the number of
    /// tasks registered; without reminder wiring nothing is registered.
    pub fn reschedule_pending_reminders(&self) -> RepoResult<usize> {
        let Some(reminders) = &self.reminders else {
            return Ok(0);
        };
        let now = self.clock.now_ms();
        let filter = TaskFilter {
            status: Some(TaskStatus::Pending),
            ..TaskFilter::with_reminders()
        };
        let mut rescheduled = 0;
        for task in self.repo.list_tasks(&filter)? {
            let (Some(id), Some(reminder_at)) = (task.id, task.reminder_at) else {
                continue;
            };
            if reminder_at <= now {
                continue;
            }
            reminders.schedule(id, reminder_at);
            rescheduled += 1;
        }
        info!(
            "event=reminder_restore module=service status=ok now={} rescheduled={}",
            now, rescheduled
        );
        Ok(rescheduled)
    }

    /// Computes home-screen counters at `now_ms`.
    pub fn statistics(&self, now_ms: i64) -> RepoResult<TaskStatistics> {
        let tasks = self.repo.list_tasks(&TaskFilter::default())?;
        let mut stats = TaskStatistics {
            total: tasks.len(),
            ..TaskStatistics::default()
        };
        for task in &tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.priority == Priority::High {
                stats.high_priority += 1;
            }
            if task.is_overdue(now_ms) {
                stats.overdue += 1;
            }
            if task.is_pending() && task.due_at.is_some_and(|due| is_due_today(due, now_ms)) {
                stats.due_today += 1;
            }
        }
        Ok(stats)
    }

    fn require(&self, id: TaskId) -> RepoResult<Task> {
        self.repo.get_task(id)?.ok_or(RepoError::NotFound(id))
    }

    fn sync_reminder(&self, id: TaskId, status: TaskStatus, reminder_at: Option<i64>) {
        let Some(reminders) = &self.reminders else {
            return;
        };
        match (status, reminder_at) {
            (TaskStatus::Pending, Some(reminder_at)) => {
                reminders.update(id, Some(reminder_at));
            }
            _ => reminders.cancel(id),
        }
    }
}
