//! Reminder registration: primary alarm plus backup job.
//!
//! # Responsibility
//! - Register, replace and cancel the two triggers that guard one reminder.
//! - Degrade to inexact wake-ups when exact alarms are not granted.
//!
//! # Invariants
//! - `schedule` always cancels the previous registration of the same task first.
//! - `cancel` removes the alarm and every job tag of the task before returning.
//! - A past-due reminder never registers an alarm.
//! - Any `i64` timestamp is accepted; delay arithmetic saturates.

use crate::model::task::TaskId;
use crate::reminder::clock::Clock;
use crate::reminder::facility::{
    AlarmFacility, AlarmKey, AlarmRequest, DeferredJobQueue, FacilityError, JobKind, JobPayload,
    JobRequest,
};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// How the primary trigger ended up registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmMode {
    Exact,
    Inexact,
    /// Both alarm paths failed; only the backup job (if any) remains.
    Missing,
}

/// Result of one `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Reminder lies in the future and was registered.
    Registered { alarm: AlarmMode, backup: bool },
    /// Reminder time already passed; a zero-delay delivery job was queued.
    Immediate { queued: bool },
}

/// Registers reminder triggers with the platform facilities.
#[derive(Clone)]
pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmFacility>,
    jobs: Arc<dyn DeferredJobQueue>,
    clock: Arc<dyn Clock>,
}

impl ReminderScheduler {
    pub fn new(
        alarms: Arc<dyn AlarmFacility>,
        jobs: Arc<dyn DeferredJobQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            alarms,
            jobs,
            clock,
        }
    }

    /// Registers an exact alarm and a backup job for `reminder_at`.
    ///
    /// When `reminder_at` is not in the future nothing is registered for later;
    /// an `Immediate` job with zero delay is queued instead.
    pub fn schedule(&self, task_id: TaskId, reminder_at: i64) -> ScheduleOutcome {
        self.cancel(task_id);

        let now = self.clock.now_ms();
        let delay_ms = reminder_at.saturating_sub(now);
        if delay_ms <= 0 {
            info!(
                "event=reminder_schedule module=reminder status=skip task_id={} reason=past_due late_ms={}",
                task_id,
                now.saturating_sub(reminder_at)
            );
            return ScheduleOutcome::Immediate {
                queued: self.enqueue_immediate(task_id, reminder_at),
            };
        }

        let alarm = self.register_alarm(AlarmRequest {
            key: AlarmKey(task_id),
            fire_at: reminder_at,
        });

        let backup = JobRequest::new(
            delay_ms,
            JobPayload {
                task_id,
                reminder_at,
                kind: JobKind::Backup,
            },
        );
        let backup = match self.jobs.enqueue(backup) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    "event=reminder_backup module=reminder status=error task_id={} error={}",
                    task_id, err
                );
                false
            }
        };

        if alarm == AlarmMode::Missing && !backup {
            error!(
                "event=reminder_schedule module=reminder status=error task_id={} error_code=no_trigger_registered",
                task_id
            );
        } else {
            info!(
                "event=reminder_schedule module=reminder status=ok task_id={} alarm={:?} backup={} delay_ms={}",
                task_id, alarm, backup, delay_ms
            );
        }

        ScheduleOutcome::Registered { alarm, backup }
    }

    /// Removes the alarm and all jobs of `task_id`.
    ///
    /// Idempotent; unknown registrations are a no-op and facility errors are
    /// only logged.
    pub fn cancel(&self, task_id: TaskId) {
        if let Err(err) = self.alarms.cancel(AlarmKey(task_id)) {
            warn!(
                "event=reminder_cancel module=reminder status=error task_id={} target=alarm error={}",
                task_id, err
            );
        }
        for kind in JobKind::ALL {
            let tag = kind.tag(task_id);
            if let Err(err) = self.jobs.cancel_by_tag(&tag) {
                warn!(
                    "event=reminder_cancel module=reminder status=error task_id={} target={} error={}",
                    task_id,
                    kind.as_str(),
                    err
                );
            }
        }
        debug!(
            "event=reminder_cancel module=reminder status=ok task_id={}",
            task_id
        );
    }

    /// Replaces the registration; `None` only cancels.
    pub fn update(&self, task_id: TaskId, reminder_at: Option<i64>) -> Option<ScheduleOutcome> {
        match reminder_at {
            // `schedule` cancels the old registration itself.
            Some(reminder_at) => Some(self.schedule(task_id, reminder_at)),
            None => {
                self.cancel(task_id);
                None
            }
        }
    }

    /// Forces a delivery of `task_id` now, replacing pending triggers.
    pub fn trigger_now(&self, task_id: TaskId) -> bool {
        self.cancel(task_id);
        self.enqueue_immediate(task_id, self.clock.now_ms())
    }

    /// Delivers an overdue reminder right away, schedules a future one.
    pub fn check_and_schedule(&self, task_id: TaskId, reminder_at: i64) -> ScheduleOutcome {
        if reminder_at <= self.clock.now_ms() {
            return ScheduleOutcome::Immediate {
                queued: self.trigger_now(task_id),
            };
        }
        self.schedule(task_id, reminder_at)
    }

    fn register_alarm(&self, request: AlarmRequest) -> AlarmMode {
        let task_id = request.key.0;
        if self.alarms.can_schedule_exact() {
            match self.alarms.set_exact_wake(request) {
                Ok(()) => return AlarmMode::Exact,
                Err(FacilityError::ExactAlarmDenied) => warn!(
                    "event=reminder_alarm module=reminder status=degraded task_id={} reason=exact_denied",
                    task_id
                ),
                Err(err) => warn!(
                    "event=reminder_alarm module=reminder status=degraded task_id={} error={}",
                    task_id, err
                ),
            }
        } else {
            warn!(
                "event=reminder_alarm module=reminder status=degraded task_id={} reason=exact_not_granted",
                task_id
            );
        }

        match self.alarms.set_inexact_wake(request) {
            Ok(()) => AlarmMode::Inexact,
            Err(err) => {
                error!(
                    "event=reminder_alarm module=reminder status=error task_id={} mode=inexact error={}",
                    task_id, err
                );
                AlarmMode::Missing
            }
        }
    }

    fn enqueue_immediate(&self, task_id: TaskId, reminder_at: i64) -> bool {
        let request = JobRequest::new(
            0,
            JobPayload {
                task_id,
                reminder_at,
                kind: JobKind::Immediate,
            },
        );
        match self.jobs.enqueue(request) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    "event=reminder_immediate module=reminder status=error task_id={} error={}",
                    task_id, err
                );
                false
            }
        }
    }
}
