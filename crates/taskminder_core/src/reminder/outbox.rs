//! Command outbox implementing every platform port.
//!
//! The mobile host cannot be called back synchronously from core, so each
//! port call is recorded as a `PlatformCommand`. After a use-case call the
//! host drains the outbox and executes the commands in order against the real
//! alarm manager, work queue and notification services.
//!
//! The outbox also keeps a live view of what is registered, which tests use
//! to assert on pending triggers.

use crate::model::task::TaskId;
use crate::reminder::facility::{
    AlarmFacility, AlarmKey, AlarmRequest, DeferredJobQueue, FacilityError, FacilityResult,
    JobRequest, Notification, Notifier, PersistentAlert,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One platform side effect requested by core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformCommand {
    SetExactAlarm(AlarmRequest),
    SetInexactAlarm(AlarmRequest),
    CancelAlarm { task_id: TaskId },
    EnqueueJob(JobRequest),
    CancelJobs { tag: String },
    ShowNotification(Notification),
    CancelNotification { id: i64 },
    StartPersistentAlert(PersistentAlert),
    StopPersistentAlert { task_id: TaskId },
}

#[derive(Debug, Default)]
struct OutboxState {
    commands: Vec<PlatformCommand>,
    alarms: BTreeMap<TaskId, AlarmRequest>,
    jobs: Vec<JobRequest>,
    visible: BTreeMap<i64, Notification>,
    alerting: Option<TaskId>,
}

/// Records platform commands for the host to execute.
#[derive(Debug)]
pub struct PlatformOutbox {
    exact_alarms_allowed: AtomicBool,
    state: Mutex<OutboxState>,
}

impl PlatformOutbox {
    /// `exact_alarms_allowed` mirrors the host's exact-alarm capability check.
    pub fn new(exact_alarms_allowed: bool) -> Self {
        Self {
            exact_alarms_allowed: AtomicBool::new(exact_alarms_allowed),
            state: Mutex::new(OutboxState::default()),
        }
    }

    pub fn set_exact_alarms_allowed(&self, allowed: bool) {
        self.exact_alarms_allowed.store(allowed, Ordering::SeqCst);
    }

    /// Takes all recorded commands in issue order.
    pub fn drain(&self) -> Vec<PlatformCommand> {
        std::mem::take(&mut self.lock().commands)
    }

    /// Commands recorded since the last drain, without taking them.
    pub fn commands(&self) -> Vec<PlatformCommand> {
        self.lock().commands.clone()
    }

    pub fn registered_alarm(&self, task_id: TaskId) -> Option<AlarmRequest> {
        self.lock().alarms.get(&task_id).copied()
    }

    /// Jobs still queued (not cancelled) for `task_id`.
    pub fn queued_jobs(&self, task_id: TaskId) -> Vec<JobRequest> {
        self.lock()
            .jobs
            .iter()
            .filter(|job| job.payload.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn all_queued_jobs(&self) -> Vec<JobRequest> {
        self.lock().jobs.clone()
    }

    pub fn visible_notification(&self, id: i64) -> Option<Notification> {
        self.lock().visible.get(&id).cloned()
    }

    pub fn alerting_task(&self) -> Option<TaskId> {
        self.lock().alerting
    }

    fn lock(&self) -> MutexGuard<'_, OutboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PlatformOutbox {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AlarmFacility for PlatformOutbox {
    fn can_schedule_exact(&self) -> bool {
        self.exact_alarms_allowed.load(Ordering::SeqCst)
    }

    fn set_exact_wake(&self, request: AlarmRequest) -> FacilityResult<()> {
        if !self.can_schedule_exact() {
            return Err(FacilityError::ExactAlarmDenied);
        }
        let mut state = self.lock();
        state.alarms.insert(request.key.0, request);
        state.commands.push(PlatformCommand::SetExactAlarm(request));
        Ok(())
    }

    fn set_inexact_wake(&self, request: AlarmRequest) -> FacilityResult<()> {
        let mut state = self.lock();
        state.alarms.insert(request.key.0, request);
        state.commands.push(PlatformCommand::SetInexactAlarm(request));
        Ok(())
    }

    fn cancel(&self, key: AlarmKey) -> FacilityResult<()> {
        let mut state = self.lock();
        state.alarms.remove(&key.0);
        state
            .commands
            .push(PlatformCommand::CancelAlarm { task_id: key.0 });
        Ok(())
    }
}

impl DeferredJobQueue for PlatformOutbox {
    fn enqueue(&self, request: JobRequest) -> FacilityResult<()> {
        let mut state = self.lock();
        state.jobs.retain(|job| job.tag != request.tag);
        state.jobs.push(request.clone());
        state.commands.push(PlatformCommand::EnqueueJob(request));
        Ok(())
    }

    fn cancel_by_tag(&self, tag: &str) -> FacilityResult<()> {
        let mut state = self.lock();
        state.jobs.retain(|job| job.tag != tag);
        state.commands.push(PlatformCommand::CancelJobs {
            tag: tag.to_string(),
        });
        Ok(())
    }
}

impl Notifier for PlatformOutbox {
    fn show(&self, notification: &Notification) -> FacilityResult<()> {
        let mut state = self.lock();
        state
            .visible
            .insert(notification.id, notification.clone());
        state
            .commands
            .push(PlatformCommand::ShowNotification(notification.clone()));
        Ok(())
    }

    fn cancel(&self, notification_id: i64) -> FacilityResult<()> {
        let mut state = self.lock();
        state.visible.remove(&notification_id);
        state
            .commands
            .push(PlatformCommand::CancelNotification { id: notification_id });
        Ok(())
    }

    fn start_persistent_alert(&self, alert: &PersistentAlert) -> FacilityResult<()> {
        let mut state = self.lock();
        state.alerting = Some(alert.task_id);
        state
            .commands
            .push(PlatformCommand::StartPersistentAlert(alert.clone()));
        Ok(())
    }

    fn stop_persistent_alert(&self, task_id: TaskId) -> FacilityResult<()> {
        let mut state = self.lock();
        if state.alerting == Some(task_id) {
            state.alerting = None;
        }
        state
            .commands
            .push(PlatformCommand::StopPersistentAlert { task_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::facility::{JobKind, JobPayload};

    #[test]
    fn exact_wake_is_denied_without_capability() {
        let outbox = PlatformOutbox::new(false);
        let request = AlarmRequest {
            key: AlarmKey(TaskId(1)),
            fire_at: 10,
        };
        assert_eq!(
            outbox.set_exact_wake(request),
            Err(FacilityError::ExactAlarmDenied)
        );
        assert!(outbox.commands().is_empty());
    }

    #[test]
    fn cancel_by_tag_only_removes_matching_jobs() {
        let outbox = PlatformOutbox::default();
        for (task, kind) in [(1, JobKind::Backup), (1, JobKind::Staggered), (2, JobKind::Backup)] {
            outbox
                .enqueue(JobRequest::new(
                    5,
                    JobPayload {
                        task_id: TaskId(task),
                        reminder_at: 5,
                        kind,
                    },
                ))
                .unwrap();
        }

        outbox.cancel_by_tag("task_reminder_1").unwrap();

        assert_eq!(outbox.queued_jobs(TaskId(1)).len(), 1);
        assert_eq!(outbox.queued_jobs(TaskId(2)).len(), 1);
    }

    #[test]
    fn drain_empties_the_command_log_but_keeps_live_state() {
        let outbox = PlatformOutbox::default();
        let request = AlarmRequest {
            key: AlarmKey(TaskId(4)),
            fire_at: 99,
        };
        outbox.set_exact_wake(request).unwrap();

        assert_eq!(outbox.drain(), vec![PlatformCommand::SetExactAlarm(request)]);
        assert!(outbox.drain().is_empty());
        assert_eq!(outbox.registered_alarm(TaskId(4)), Some(request));
    }

    #[test]
    fn commands_serialize_with_type_tag() {
        let json = serde_json::to_value(PlatformCommand::CancelJobs {
            tag: "task_reminder_1".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "cancel_jobs");
        assert_eq!(json["tag"], "task_reminder_1");
    }

    #[test]
    fn enqueue_replaces_a_queued_job_with_the_same_tag() {
        let outbox = PlatformOutbox::default();
        for delay_ms in [25_000, 50_000, 25_000] {
            outbox
                .enqueue(JobRequest::new(
                    delay_ms,
                    JobPayload {
                        task_id: TaskId(6),
                        reminder_at: 5,
                        kind: JobKind::Staggered,
                    },
                ))
                .unwrap();
        }
        outbox
            .enqueue(JobRequest::new(
                0,
                JobPayload {
                    task_id: TaskId(6),
                    reminder_at: 5,
                    kind: JobKind::Backup,
                },
            ))
            .unwrap();

        let jobs = outbox.queued_jobs(TaskId(6));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].payload.kind, JobKind::Staggered);
        assert_eq!(jobs[0].delay_ms, 25_000);
        assert_eq!(jobs[1].payload.kind, JobKind::Backup);
        assert_eq!(outbox.commands().len(), 4);
    }
}
