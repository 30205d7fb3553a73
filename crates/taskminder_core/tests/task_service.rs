use std::sync::Arc;
use taskminder_core::reminder::facility::JobKind;
use taskminder_core::time::start_of_local_day;
use taskminder_core::{
    open_db_in_memory, FixedClock, NewTask, Priority, ReminderRuntime, RepoError,
    SqliteTaskRepository, TaskFilter, TaskId, TaskService, TaskStatus,
};

const NOW: i64 = 1_700_000_000_000;
const HOUR: i64 = 3_600_000;

fn runtime(clock: &Arc<FixedClock>) -> ReminderRuntime {
    ReminderRuntime::with_default_policy(true, clock.clone())
}

fn with_reminder(title: &str, reminder_at: i64) -> NewTask {
    NewTask {
        reminder_at: Some(reminder_at),
        ..NewTask::new(title)
    }
}

#[test]
fn add_task_stamps_creation_time_and_registers_reminder() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));

    let id = service.add_task(with_reminder("call mom", NOW + HOUR)).unwrap();

    let task = service.get_task(id).unwrap().unwrap();
    assert_eq!(task.created_at, NOW);
    let alarm = runtime.outbox().registered_alarm(id).unwrap();
    assert_eq!(alarm.fire_at, NOW + HOUR);
    let jobs = runtime.outbox().queued_jobs(id);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload.kind, JobKind::Backup);
    assert_eq!(jobs[0].delay_ms, HOUR);
}

#[test]
fn add_task_without_reminder_registers_nothing() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));

    let id = service.add_task(NewTask::new("plain")).unwrap();

    assert!(runtime.outbox().registered_alarm(id).is_none());
    assert!(runtime.outbox().queued_jobs(id).is_empty());
}

#[test]
fn blank_title_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(
        SqliteTaskRepository::new(&conn),
        Arc::new(FixedClock::new(NOW)),
    );

    assert!(matches!(
        service.add_task(NewTask::new("   ")),
        Err(RepoError::Validation(_))
    ));
    assert!(service.list_tasks(&TaskFilter::default()).unwrap().is_empty());
}

#[test]
fn completing_cancels_and_reopening_reschedules() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));
    let id = service.add_task(with_reminder("water plants", NOW + HOUR)).unwrap();

    assert_eq!(service.toggle_completion(id).unwrap(), TaskStatus::Completed);
    assert!(runtime.outbox().registered_alarm(id).is_none());
    assert!(runtime.outbox().queued_jobs(id).is_empty());

    assert_eq!(service.toggle_completion(id).unwrap(), TaskStatus::Pending);
    assert!(runtime.outbox().registered_alarm(id).is_some());
    assert_eq!(runtime.outbox().queued_jobs(id).len(), 1);
}

#[test]
fn update_replaces_registration_and_clearing_removes_it() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));
    let id = service.add_task(with_reminder("dentist", NOW + HOUR)).unwrap();

    let mut task = service.get_task(id).unwrap().unwrap();
    task.reminder_at = Some(NOW + 2 * HOUR);
    task.title = "  dentist   appointment ".to_string();
    service.update_task(&task).unwrap();

    assert_eq!(
        service.get_task(id).unwrap().unwrap().title,
        "dentist appointment"
    );
    assert_eq!(
        runtime.outbox().registered_alarm(id).unwrap().fire_at,
        NOW + 2 * HOUR
    );
    assert_eq!(runtime.outbox().queued_jobs(id).len(), 1);

    service.set_reminder(id, None).unwrap();
    assert!(runtime.outbox().registered_alarm(id).is_none());
    assert!(runtime.outbox().queued_jobs(id).is_empty());
    assert_eq!(service.get_task(id).unwrap().unwrap().reminder_at, None);
}

#[test]
fn update_of_unknown_task_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));
    let id = service.add_task(NewTask::new("real")).unwrap();

    let mut ghost = service.get_task(id).unwrap().unwrap();
    ghost.id = Some(TaskId(id.get() + 100));
    assert!(matches!(
        service.update_task(&ghost),
        Err(RepoError::NotFound(_))
    ));
    assert!(matches!(
        service.set_status(TaskId(999), TaskStatus::Completed),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn delete_cancels_registration_first() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));
    let id = service.add_task(with_reminder("bills", NOW + HOUR)).unwrap();

    service.delete_task(id).unwrap();

    assert!(service.get_task(id).unwrap().is_none());
    assert!(runtime.outbox().registered_alarm(id).is_none());
    assert!(runtime.outbox().all_queued_jobs().is_empty());
}

#[test]
fn delete_completed_only_touches_completed_tasks() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));
    let keep = service.add_task(with_reminder("keep", NOW + HOUR)).unwrap();
    let gone = service.add_task(NewTask::new("gone")).unwrap();
    service.set_status(gone, TaskStatus::Completed).unwrap();

    assert_eq!(service.delete_completed().unwrap(), 1);
    assert!(service.get_task(gone).unwrap().is_none());
    assert!(runtime.outbox().registered_alarm(keep).is_some());
}

#[test]
fn set_priority_keeps_other_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(
        SqliteTaskRepository::new(&conn),
        Arc::new(FixedClock::new(NOW)),
    );
    let id = service.add_task(with_reminder("taxes", NOW + HOUR)).unwrap();

    service.set_priority(id, Priority::High).unwrap();

    let task = service.get_task(id).unwrap().unwrap();
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.reminder_at, Some(NOW + HOUR));
}

#[test]
fn statistics_count_buckets() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let service = TaskService::new(SqliteTaskRepository::new(&conn), clock.clone());
    let today_start = start_of_local_day(NOW).unwrap();

    service
        .add_task(NewTask {
            priority: Priority::High,
            due_at: Some(today_start - 1),
            ..NewTask::new("overdue high")
        })
        .unwrap();
    service
        .add_task(NewTask {
            due_at: Some(today_start + 1),
            ..NewTask::new("due today")
        })
        .unwrap();
    let done = service.add_task(NewTask::new("done")).unwrap();
    service.set_status(done, TaskStatus::Completed).unwrap();

    let stats = service.statistics(NOW).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.high_priority, 1);
    assert_eq!(stats.overdue, 2);
    assert_eq!(stats.due_today, 1);
}

#[test]
fn add_task_with_extreme_reminder_times_keeps_the_row_and_a_trigger() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(NOW));
    let runtime = runtime(&clock);
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));

    let ancient = service.add_task(with_reminder("ancient", i64::MIN)).unwrap();
    let distant = service.add_task(with_reminder("distant", i64::MAX)).unwrap();

    assert!(service.get_task(ancient).unwrap().is_some());
    assert!(runtime.outbox().registered_alarm(ancient).is_none());
    let jobs = runtime.outbox().queued_jobs(ancient);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload.kind, JobKind::Immediate);

    assert_eq!(
        runtime.outbox().registered_alarm(distant).unwrap().fire_at,
        i64::MAX
    );
}
