//! Reminder delivery and the single owner of "currently ringing" state.
//!
//! # Responsibility
//! - Surface one task through both delivery paths: a notification and a
//!   persistent alert.
//! - Track which task (if any) is ringing and stop it on request.
//!
//! # Invariants
//! - At most one persistent alert rings at a time; starting a new one stops
//!   the previous task's alert first.
//! - `stop_active_delivery` is the only way to clear the ringing state.
//! - Delivery never reads or writes task status.

use crate::model::task::{Task, TaskId};
use crate::reminder::facility::{Notification, NotificationAction, Notifier, PersistentAlert};
use crate::reminder::policy::ReminderPolicy;
use crate::time::notification_body;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const NOTIFICATION_TITLE_PREFIX: &str = "Task reminder: ";

/// What one `deliver` call managed to surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub notified: bool,
    pub alerting: bool,
}

impl DeliveryReport {
    /// At least one delivery path reached the user.
    pub fn is_delivered(&self) -> bool {
        self.notified || self.alerting
    }
}

/// Presents reminders and owns the ringing-task state.
pub struct DeliveryHandler {
    notifier: Arc<dyn Notifier>,
    policy: ReminderPolicy,
    active: Mutex<Option<TaskId>>,
}

impl DeliveryHandler {
    pub fn new(notifier: Arc<dyn Notifier>, policy: ReminderPolicy) -> Self {
        Self {
            notifier,
            policy,
            active: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    /// Task whose persistent alert is currently ringing.
    pub fn active_task(&self) -> Option<TaskId> {
        *self.lock_active()
    }

    /// Shows the notification and starts the persistent alert for `task`.
    ///
    /// Both paths are attempted even if the first fails.
    pub fn deliver(&self, task: &Task) -> DeliveryReport {
        let Some(task_id) = task.id else {
            warn!("event=reminder_deliver module=reminder status=skip reason=unsaved_task");
            return DeliveryReport::default();
        };

        let body = notification_body(task);
        let title = format!("{NOTIFICATION_TITLE_PREFIX}{}", task.title);
        let mut report = DeliveryReport::default();

        let notification = Notification {
            id: task_id.get(),
            title: title.clone(),
            body: body.clone(),
            actions: vec![NotificationAction::Open, NotificationAction::StopReminder],
        };
        match self.notifier.show(&notification) {
            Ok(()) => report.notified = true,
            Err(err) => warn!(
                "event=reminder_deliver module=reminder status=error task_id={} path=notification error={}",
                task_id, err
            ),
        }

        let mut active = self.lock_active();
        if let Some(previous) = active.filter(|previous| *previous != task_id) {
            if let Err(err) = self.notifier.stop_persistent_alert(previous) {
                warn!(
                    "event=reminder_alert_stop module=reminder status=error task_id={} error={}",
                    previous, err
                );
            }
            *active = None;
        }

        let alert = PersistentAlert {
            task_id,
            title,
            body,
            duration_ms: self.policy.persistent_alert_ms,
        };
        match self.notifier.start_persistent_alert(&alert) {
            Ok(()) => {
                *active = Some(task_id);
                report.alerting = true;
            }
            Err(err) => warn!(
                "event=reminder_deliver module=reminder status=error task_id={} path=persistent_alert error={}",
                task_id, err
            ),
        }
        drop(active);

        info!(
            "event=reminder_deliver module=reminder status={} task_id={} notified={} alerting={}",
            if report.is_delivered() { "ok" } else { "error" },
            task_id,
            report.notified,
            report.alerting
        );
        report
    }

    /// Stops the ringing alert of `task_id` and dismisses its notification.
    ///
    /// Returns whether an alert for this task was ringing.
    pub fn stop_active_delivery(&self, task_id: TaskId) -> bool {
        let mut active = self.lock_active();
        let was_ringing = *active == Some(task_id);
        if was_ringing {
            if let Err(err) = self.notifier.stop_persistent_alert(task_id) {
                warn!(
                    "event=reminder_alert_stop module=reminder status=error task_id={} error={}",
                    task_id, err
                );
            }
            *active = None;
        }
        drop(active);

        if let Err(err) = self.notifier.cancel(task_id.get()) {
            warn!(
                "event=reminder_dismiss module=reminder status=error task_id={} error={}",
                task_id, err
            );
        }
        info!(
            "event=reminder_stop module=reminder status=ok task_id={} was_ringing={}",
            task_id, was_ringing
        );
        was_ringing
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<TaskId>> {
        // The guarded value is a plain id; a poisoned lock still holds a usable one.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
