//! Fire-time reminder dispatch.
//!
//! # Responsibility
//! - Handle an alarm firing: pick every due task, deliver the top-ranked one
//!   now and stagger the rest through the job queue.
//! - Handle backup/staggered/immediate jobs and startup recovery.
//!
//! # Invariants
//! - Dispatch only reads tasks; it never changes task status.
//! - One task's enqueue failure never stops dispatch of the others.
//! - A store read failure abandons only the current firing.
//! - Job deliveries re-read the task and skip anything no longer pending.

use crate::model::task::{Task, TaskId};
use crate::reminder::clock::Clock;
use crate::reminder::delivery::{DeliveryHandler, DeliveryReport};
use crate::reminder::facility::{DeferredJobQueue, JobKind, JobPayload, JobRequest};
use crate::reminder::policy::rank_due_tasks;
use crate::repo::task_repo::TaskRepository;
use log::{error, info, warn};
use std::sync::Arc;

/// One lower-ranked task queued for later delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaggeredDelivery {
    pub task_id: TaskId,
    pub delay_ms: i64,
}

/// Result of one alarm firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No pending task was due.
    Idle,
    Dispatched {
        immediate: TaskId,
        report: DeliveryReport,
        staggered: Vec<StaggeredDelivery>,
        /// Tasks whose staggered job could not be queued.
        failed: Vec<TaskId>,
    },
    /// The due-task query failed; nothing was delivered.
    Aborted(String),
}

/// Result of one deferred job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered(DeliveryReport),
    SkippedNotPending,
    SkippedMissing,
    Failed(String),
}

/// Reacts to platform triggers by delivering due reminders.
pub struct ReminderDispatcher<R: TaskRepository> {
    repo: R,
    jobs: Arc<dyn DeferredJobQueue>,
    delivery: Arc<DeliveryHandler>,
    clock: Arc<dyn Clock>,
}

impl<R: TaskRepository> ReminderDispatcher<R> {
    pub fn new(
        repo: R,
        jobs: Arc<dyn DeferredJobQueue>,
        delivery: Arc<DeliveryHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            jobs,
            delivery,
            clock,
        }
    }

    /// Primary trigger path.
    ///
    /// `fired_at` is the reminder time carried by the alarm; a missing or
    /// non-positive value falls back to now.
    pub fn on_alarm_fired(&self, fired_at: Option<i64>) -> DispatchOutcome {
        let reminder_time = fired_at
            .filter(|value| *value > 0)
            .unwrap_or_else(|| self.clock.now_ms());

        let due = match self.repo.list_due_reminders(reminder_time) {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(
                    "event=reminder_fire module=reminder status=error reminder_at={} error={}",
                    reminder_time, err
                );
                return DispatchOutcome::Aborted(err.to_string());
            }
        };

        let due = due
            .into_iter()
            .filter(|task| task.is_pending() && task.id.is_some())
            .collect::<Vec<_>>();
        if due.is_empty() {
            info!(
                "event=reminder_fire module=reminder status=skip reminder_at={} reason=nothing_due",
                reminder_time
            );
            return DispatchOutcome::Idle;
        }

        let mut ranked = rank_due_tasks(due).into_iter().filter_map(with_id);
        let Some((immediate, first)) = ranked.next() else {
            return DispatchOutcome::Idle;
        };
        let report = self.delivery.deliver(&first);

        let policy = *self.delivery.policy();
        let mut staggered = Vec::new();
        let mut failed = Vec::new();
        for (rank, (task_id, _task)) in ranked.enumerate() {
            let delay_ms = policy.stagger_delay_ms(rank);
            let request = JobRequest::new(
                delay_ms,
                JobPayload {
                    task_id,
                    reminder_at: reminder_time,
                    kind: JobKind::Staggered,
                },
            );
            match self.jobs.enqueue(request) {
                Ok(()) => staggered.push(StaggeredDelivery { task_id, delay_ms }),
                Err(err) => {
                    error!(
                        "event=reminder_stagger module=reminder status=error task_id={} error={}",
                        task_id, err
                    );
                    failed.push(task_id);
                }
            }
        }

        info!(
            "event=reminder_fire module=reminder status=ok reminder_at={} immediate={} staggered={} failed={}",
            reminder_time,
            immediate,
            staggered.len(),
            failed.len()
        );
        DispatchOutcome::Dispatched {
            immediate,
            report,
            staggered,
            failed,
        }
    }

    /// Backup, staggered and immediate job path.
    pub fn on_job_fired(&self, payload: &JobPayload) -> JobOutcome {
        let task_id = payload.task_id;
        let task = match self.repo.get_task(task_id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(
                    "event=reminder_job module=reminder status=skip task_id={} kind={} reason=missing",
                    task_id,
                    payload.kind.as_str()
                );
                return JobOutcome::SkippedMissing;
            }
            Err(err) => {
                error!(
                    "event=reminder_job module=reminder status=error task_id={} kind={} error={}",
                    task_id,
                    payload.kind.as_str(),
                    err
                );
                return JobOutcome::Failed(err.to_string());
            }
        };

        if !task.is_pending() {
            info!(
                "event=reminder_job module=reminder status=skip task_id={} kind={} reason=not_pending",
                task_id,
                payload.kind.as_str()
            );
            return JobOutcome::SkippedNotPending;
        }

        JobOutcome::Delivered(self.delivery.deliver(&task))
    }

    /// Delivers every overdue pending reminder at process start.
    ///
    /// No alarm or backup is registered: those times have already passed and
    /// the platform will not fire them retroactively. Returns the number of
    /// tasks that reached the user.
    pub fn check_overdue_on_startup(&self) -> usize {
        let now = self.clock.now_ms();
        let overdue = match self.repo.list_due_reminders(now) {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(
                    "event=reminder_recover module=reminder status=error now={} error={}",
                    now, err
                );
                return 0;
            }
        };

        let delivered = overdue
            .iter()
            .filter(|task| task.is_pending())
            .map(|task| self.delivery.deliver(task))
            .filter(DeliveryReport::is_delivered)
            .count();

        info!(
            "event=reminder_recover module=reminder status=ok now={} overdue={} delivered={}",
            now,
            overdue.len(),
            delivered
        );
        delivered
    }

    /// Stops the ringing alert for `task_id`, e.g. when the user opens it.
    pub fn stop_active_delivery(&self, task_id: TaskId) -> bool {
        self.delivery.stop_active_delivery(task_id)
    }
}

fn with_id(task: Task) -> Option<(TaskId, Task)> {
    task.id.map(|id| (id, task))
}
