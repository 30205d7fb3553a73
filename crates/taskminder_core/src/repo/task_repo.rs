//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, filter and reminder-snapshot queries over `tasks` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `list_due_reminders` returns rows in stable `id ASC` order.

use crate::db::DbError;
use crate::model::filter::TaskFilter;
use crate::model::task::{Priority, Task, TaskId, TaskStatus, TaskValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    due_at,
    priority,
    status,
    reminder_at,
    created_at
FROM tasks";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    /// Insert was called with a task that already carries a store id.
    AlreadyPersisted(TaskId),
    /// Update was called with a task that was never inserted.
    Unsaved,
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::AlreadyPersisted(id) => write!(f, "task already persisted with id {id}"),
            Self::Unsaved => write!(f, "task has no id; insert it first"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for task storage.
///
/// Calls are synchronous; hosts run them off the UI thread.
pub trait TaskRepository {
    fn insert_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>>;
    /// Pending tasks whose reminder is set and `<= before_or_at`.
    fn list_due_reminders(&self, before_or_at: i64) -> RepoResult<Vec<Task>>;
    fn update_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()>;
    fn list_completed_ids(&self) -> RepoResult<Vec<TaskId>>;
    /// Bulk-deletes completed tasks and returns the number removed.
    fn delete_completed(&self) -> RepoResult<usize>;
    fn count_by_status(&self, status: TaskStatus) -> RepoResult<usize>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert_task(&self, task: &Task) -> RepoResult<TaskId> {
        if let Some(id) = task.id {
            return Err(RepoError::AlreadyPersisted(id));
        }
        task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (
                title,
                description,
                due_at,
                priority,
                status,
                reminder_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
            params![
                task.title.as_str(),
                task.description.as_deref(),
                task.due_at,
                task.priority.level(),
                task.status.as_str(),
                task.reminder_at,
                task.created_at,
            ],
        )?;

        Ok(TaskId(self.conn.last_insert_rowid()))
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        let id = task.id.ok_or(RepoError::Unsaved)?;
        task.validate()?;

        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                title = ?1,
                description = ?2,
                due_at = ?3,
                priority = ?4,
                status = ?5,
                reminder_at = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?7;",
            params![
                task.title.as_str(),
                task.description.as_deref(),
                task.due_at,
                task.priority.level(),
                task.status.as_str(),
                task.reminder_at,
                id.get(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.get()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.get()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        if let Some(priority) = filter.priority {
            sql.push_str(" AND priority = ?");
            bind_values.push(Value::Integer(priority.level()));
        }

        match filter.has_due_date {
            Some(true) => sql.push_str(" AND due_at IS NOT NULL"),
            Some(false) => sql.push_str(" AND due_at IS NULL"),
            None => {}
        }

        match filter.has_reminder {
            Some(true) => sql.push_str(" AND reminder_at IS NOT NULL"),
            Some(false) => sql.push_str(" AND reminder_at IS NULL"),
            None => {}
        }

        if let Some(text) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            sql.push_str(
                " AND (title LIKE ? ESCAPE '\\' OR coalesce(description, '') LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(text));
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        if let Some(now_ms) = filter.overdue_at {
            sql.push_str(" AND status = 'pending' AND due_at IS NOT NULL AND due_at < ?");
            bind_values.push(Value::Integer(now_ms));
        }

        sql.push_str(" ORDER BY due_at IS NULL ASC, due_at ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn list_due_reminders(&self, before_or_at: i64) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE status = 'pending'
               AND reminder_at IS NOT NULL
               AND reminder_at <= ?1
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([before_or_at])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                status = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![status.as_str(), id.get()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list_completed_ids(&self) -> RepoResult<Vec<TaskId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM tasks WHERE status = 'completed' ORDER BY id ASC;")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(TaskId))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn delete_completed(&self) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM tasks WHERE status = 'completed';", [])?;
        Ok(removed)
    }

    fn count_by_status(&self, status: TaskStatus) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1;",
            [status.as_str()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative task count `{count}`")))
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id = TaskId(row.get("id")?);

    let level: i64 = row.get("priority")?;
    let priority = Priority::from_level(level).map_err(|_| {
        RepoError::InvalidData(format!("invalid priority `{level}` in tasks.priority (id={id})"))
    })?;

    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in tasks.status (id={id})"
        ))
    })?;

    let task = Task {
        id: Some(id),
        title: row.get("title")?,
        description: row.get("description")?,
        due_at: row.get("due_at")?,
        priority,
        status,
        reminder_at: row.get("reminder_at")?,
        created_at: row.get("created_at")?,
    };
    task.validate()
        .map_err(|err| RepoError::InvalidData(format!("{err} (id={id})")))?;
    Ok(task)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
