use taskminder_core::{
    open_db_in_memory, NewTask, Priority, RepoError, SqliteTaskRepository, Task, TaskFilter,
    TaskId, TaskRepository, TaskStatus, TaskValidationError,
};

fn task(title: &str, priority: Priority, due_at: Option<i64>, reminder_at: Option<i64>) -> Task {
    Task::new(
        NewTask {
            priority,
            due_at,
            reminder_at,
            ..NewTask::new(title)
        },
        1_000,
    )
    .unwrap()
}

#[test]
fn insert_then_get_returns_normalized_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut input = task("  buy   milk ", Priority::High, Some(5_000), Some(4_000));
    input.description = Some("   ".to_string());
    input.normalize();
    let id = repo.insert_task(&input).unwrap();

    let loaded = repo.get_task(id).unwrap().unwrap();
    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.title, "buy milk");
    assert_eq!(loaded.description, None);
    assert_eq!(loaded.priority, Priority::High);
    assert_eq!(loaded.status, TaskStatus::Pending);
    assert_eq!(loaded.reminder_at, Some(4_000));
    assert_eq!(loaded.created_at, 1_000);
}

#[test]
fn insert_rejects_persisted_or_blank_tasks() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut persisted = task("x", Priority::Low, None, None);
    persisted.id = Some(TaskId(9));
    assert!(matches!(
        repo.insert_task(&persisted),
        Err(RepoError::AlreadyPersisted(TaskId(9)))
    ));

    let mut blank = task("x", Priority::Low, None, None);
    blank.title = " ".to_string();
    assert!(matches!(
        repo.insert_task(&blank),
        Err(RepoError::Validation(TaskValidationError::BlankTitle))
    ));
}

#[test]
fn update_and_delete_unknown_ids_report_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut ghost = task("ghost", Priority::Medium, None, None);
    assert!(matches!(repo.update_task(&ghost), Err(RepoError::Unsaved)));

    ghost.id = Some(TaskId(404));
    assert!(matches!(
        repo.update_task(&ghost),
        Err(RepoError::NotFound(TaskId(404)))
    ));
    assert!(matches!(
        repo.delete_task(TaskId(404)),
        Err(RepoError::NotFound(_))
    ));
    assert!(matches!(
        repo.update_status(TaskId(404), TaskStatus::Completed),
        Err(RepoError::NotFound(_))
    ));
    assert!(repo.get_task(TaskId(404)).unwrap().is_none());
}

#[test]
fn list_orders_by_due_date_with_undated_last() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let undated = repo
        .insert_task(&task("undated", Priority::High, None, None))
        .unwrap();
    let late = repo
        .insert_task(&task("late", Priority::Low, Some(9_000), None))
        .unwrap();
    let early = repo
        .insert_task(&task("early", Priority::Low, Some(2_000), None))
        .unwrap();

    let ids = repo
        .list_tasks(&TaskFilter::default())
        .unwrap()
        .into_iter()
        .filter_map(|task| task.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![early, late, undated]);
}

#[test]
fn filters_combine_status_priority_reminder_search_and_overdue() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let report = repo
        .insert_task(&task("Write report", Priority::High, Some(1_000), Some(900)))
        .unwrap();
    let groceries = repo
        .insert_task(&task("groceries", Priority::Low, Some(50_000), None))
        .unwrap();
    let done = repo
        .insert_task(&task("100% done_", Priority::High, Some(500), None))
        .unwrap();
    repo.update_status(done, TaskStatus::Completed).unwrap();

    let ids = |filter: TaskFilter| {
        repo.list_tasks(&filter)
            .unwrap()
            .into_iter()
            .filter_map(|task| task.id)
            .collect::<Vec<_>>()
    };

    assert_eq!(ids(TaskFilter::pending()), vec![report, groceries]);
    assert_eq!(ids(TaskFilter::completed()), vec![done]);
    assert_eq!(ids(TaskFilter::with_priority(Priority::High)), vec![done, report]);
    assert_eq!(ids(TaskFilter::with_reminders()), vec![report]);
    assert_eq!(ids(TaskFilter::search("REPORT")), vec![report]);
    assert_eq!(ids(TaskFilter::search("100%")), vec![done]);
    assert_eq!(ids(TaskFilter::search("0%")), vec![done]);
    assert!(ids(TaskFilter::search("e_d")).is_empty());
    assert_eq!(ids(TaskFilter::overdue(2_000)), vec![report]);
}

#[test]
fn due_reminder_snapshot_is_pending_only_and_ordered_by_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let second = repo
        .insert_task(&task("b", Priority::Low, None, Some(100)))
        .unwrap();
    let future = repo
        .insert_task(&task("c", Priority::High, None, Some(10_000)))
        .unwrap();
    let completed = repo
        .insert_task(&task("d", Priority::High, None, Some(50)))
        .unwrap();
    repo.update_status(completed, TaskStatus::Completed).unwrap();
    let exact = repo
        .insert_task(&task("e", Priority::Medium, None, Some(200)))
        .unwrap();

    let due = repo
        .list_due_reminders(200)
        .unwrap()
        .into_iter()
        .filter_map(|task| task.id)
        .collect::<Vec<_>>();
    assert_eq!(due, vec![second, exact]);
    assert!(!due.contains(&future));
}

#[test]
fn bulk_delete_completed_and_counts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let keep = repo.insert_task(&task("keep", Priority::Low, None, None)).unwrap();
    for title in ["a", "b"] {
        let id = repo.insert_task(&task(title, Priority::Low, None, None)).unwrap();
        repo.update_status(id, TaskStatus::Completed).unwrap();
    }

    assert_eq!(repo.count_by_status(TaskStatus::Completed).unwrap(), 2);
    assert_eq!(repo.list_completed_ids().unwrap().len(), 2);
    assert_eq!(repo.delete_completed().unwrap(), 2);
    assert_eq!(repo.count_by_status(TaskStatus::Completed).unwrap(), 0);
    assert_eq!(repo.count_by_status(TaskStatus::Pending).unwrap(), 1);
    assert!(repo.get_task(keep).unwrap().is_some());
}

#[test]
fn corrupted_priority_surfaces_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);
    let id = repo.insert_task(&task("x", Priority::Low, None, None)).unwrap();

    conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
        .unwrap();
    conn.execute("UPDATE tasks SET priority = 7 WHERE id = ?1;", [id.get()])
        .unwrap();

    assert!(matches!(repo.get_task(id), Err(RepoError::InvalidData(_))));
}
