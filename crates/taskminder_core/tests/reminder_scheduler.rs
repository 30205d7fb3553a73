use std::sync::Arc;
use taskminder_core::reminder::facility::{
    AlarmFacility, AlarmKey, AlarmRequest, FacilityError, FacilityResult, JobKind,
};
use taskminder_core::reminder::scheduler::AlarmMode;
use taskminder_core::{
    FixedClock, PlatformCommand, PlatformOutbox, ReminderScheduler, ScheduleOutcome, TaskId,
};

const NOW: i64 = 1_700_000_000_000;

fn scheduler(outbox: &Arc<PlatformOutbox>, clock: &Arc<FixedClock>) -> ReminderScheduler {
    ReminderScheduler::new(outbox.clone(), outbox.clone(), clock.clone())
}

#[test]
fn future_reminder_registers_exact_alarm_and_backup_job() {
    let outbox = Arc::new(PlatformOutbox::new(true));
    let clock = Arc::new(FixedClock::new(NOW));
    let id = TaskId(3);

    let outcome = scheduler(&outbox, &clock).schedule(id, NOW + 90_000);

    assert_eq!(
        outcome,
        ScheduleOutcome::Registered {
            alarm: AlarmMode::Exact,
            backup: true
        }
    );
    assert_eq!(outbox.registered_alarm(id).unwrap().fire_at, NOW + 90_000);
    let jobs = outbox.queued_jobs(id);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].tag, "task_reminder_3");
    assert_eq!(jobs[0].delay_ms, 90_000);
    assert_eq!(jobs[0].payload.reminder_at, NOW + 90_000);
}

#[test]
fn schedule_then_cancel_leaves_nothing_registered() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = scheduler(&outbox, &clock);
    let id = TaskId(1);

    scheduler.schedule(id, NOW + 1_000);
    scheduler.cancel(id);

    assert!(outbox.registered_alarm(id).is_none());
    assert!(outbox.queued_jobs(id).is_empty());
    let cancelled_tags = outbox
        .commands()
        .into_iter()
        .filter_map(|command| match command {
            PlatformCommand::CancelJobs { tag } => Some(tag),
            _ => None,
        })
        .collect::<Vec<_>>();
    for kind in JobKind::ALL {
        assert!(cancelled_tags.contains(&kind.tag(id)));
    }
}

#[test]
fn rescheduling_replaces_instead_of_duplicating() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = scheduler(&outbox, &clock);
    let id = TaskId(8);

    scheduler.schedule(id, NOW + 1_000);
    scheduler.schedule(id, NOW + 5_000);

    assert_eq!(outbox.registered_alarm(id).unwrap().fire_at, NOW + 5_000);
    assert_eq!(outbox.queued_jobs(id).len(), 1);
}

#[test]
fn past_reminder_queues_immediate_job_without_alarm() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let id = TaskId(2);

    let outcome = scheduler(&outbox, &clock).schedule(id, NOW - 10);

    assert_eq!(outcome, ScheduleOutcome::Immediate { queued: true });
    assert!(outbox.registered_alarm(id).is_none());
    let jobs = outbox.queued_jobs(id);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload.kind, JobKind::Immediate);
    assert_eq!(jobs[0].delay_ms, 0);
    assert!(!outbox
        .commands()
        .iter()
        .any(|command| matches!(command, PlatformCommand::SetExactAlarm(_))));
}

#[test]
fn reminder_equal_to_now_counts_as_past() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));

    let outcome = scheduler(&outbox, &clock).schedule(TaskId(4), NOW);

    assert_eq!(outcome, ScheduleOutcome::Immediate { queued: true });
}

#[test]
fn update_with_none_only_cancels() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = scheduler(&outbox, &clock);
    let id = TaskId(5);
    scheduler.schedule(id, NOW + 1_000);

    assert_eq!(scheduler.update(id, None), None);

    assert!(outbox.registered_alarm(id).is_none());
    assert!(outbox.queued_jobs(id).is_empty());
}

#[test]
fn denied_exact_capability_falls_back_to_inexact_alarm() {
    let outbox = Arc::new(PlatformOutbox::new(false));
    let clock = Arc::new(FixedClock::new(NOW));
    let id = TaskId(6);

    let outcome = scheduler(&outbox, &clock).schedule(id, NOW + 1_000);

    assert_eq!(
        outcome,
        ScheduleOutcome::Registered {
            alarm: AlarmMode::Inexact,
            backup: true
        }
    );
    assert!(outbox
        .commands()
        .iter()
        .any(|command| matches!(command, PlatformCommand::SetInexactAlarm(_))));
    assert_eq!(outbox.queued_jobs(id).len(), 1);
}

/// Claims exact capability but rejects every exact request.
struct RevokedExact(Arc<PlatformOutbox>);

impl AlarmFacility for RevokedExact {
    fn can_schedule_exact(&self) -> bool {
        true
    }

    fn set_exact_wake(&self, _request: AlarmRequest) -> FacilityResult<()> {
        Err(FacilityError::ExactAlarmDenied)
    }

    fn set_inexact_wake(&self, request: AlarmRequest) -> FacilityResult<()> {
        self.0.set_inexact_wake(request)
    }

    fn cancel(&self, key: AlarmKey) -> FacilityResult<()> {
        AlarmFacility::cancel(self.0.as_ref(), key)
    }
}

#[test]
fn exact_request_rejected_at_call_time_still_degrades() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = ReminderScheduler::new(
        Arc::new(RevokedExact(outbox.clone())),
        outbox.clone(),
        clock,
    );

    let outcome = scheduler.schedule(TaskId(7), NOW + 1_000);

    assert_eq!(
        outcome,
        ScheduleOutcome::Registered {
            alarm: AlarmMode::Inexact,
            backup: true
        }
    );
}

#[test]
fn cancel_of_unknown_task_is_a_no_op() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = scheduler(&outbox, &clock);
    scheduler.schedule(TaskId(1), NOW + 1_000);

    scheduler.cancel(TaskId(77));

    assert!(outbox.registered_alarm(TaskId(1)).is_some());
    assert_eq!(outbox.all_queued_jobs().len(), 1);
}

#[test]
fn check_and_schedule_triggers_overdue_and_schedules_future() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = scheduler(&outbox, &clock);

    assert_eq!(
        scheduler.check_and_schedule(TaskId(1), NOW - 5_000),
        ScheduleOutcome::Immediate { queued: true }
    );
    assert!(matches!(
        scheduler.check_and_schedule(TaskId(2), NOW + 5_000),
        ScheduleOutcome::Registered { .. }
    ));

    let immediate = outbox.queued_jobs(TaskId(1));
    assert_eq!(immediate.len(), 1);
    assert_eq!(immediate[0].payload.reminder_at, NOW);
    assert!(outbox.registered_alarm(TaskId(2)).is_some());
}

#[test]
fn extreme_reminder_times_saturate_instead_of_overflowing() {
    let outbox = Arc::new(PlatformOutbox::default());
    let clock = Arc::new(FixedClock::new(NOW));
    let scheduler = scheduler(&outbox, &clock);

    assert_eq!(
        scheduler.schedule(TaskId(1), i64::MIN),
        ScheduleOutcome::Immediate { queued: true }
    );
    assert!(outbox.registered_alarm(TaskId(1)).is_none());
    let immediate = outbox.queued_jobs(TaskId(1));
    assert_eq!(immediate.len(), 1);
    assert_eq!(immediate[0].payload.kind, JobKind::Immediate);
    assert_eq!(immediate[0].delay_ms, 0);

    assert_eq!(
        scheduler.schedule(TaskId(2), i64::MAX),
        ScheduleOutcome::Registered {
            alarm: AlarmMode::Exact,
            backup: true
        }
    );
    assert_eq!(outbox.registered_alarm(TaskId(2)).unwrap().fire_at, i64::MAX);
    assert_eq!(outbox.queued_jobs(TaskId(2))[0].delay_ms, i64::MAX - NOW);
}
