//! Core domain logic for TaskMinder.
//! Task storage, reminder scheduling and fire-time dispatch live here; the
//! mobile host only executes the platform commands this crate emits.

pub mod db;
pub mod logging;
pub mod model;
pub mod reminder;
pub mod repo;
pub mod service;
pub mod time;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::filter::TaskFilter;
pub use model::task::{NewTask, Priority, Task, TaskId, TaskStatus, TaskValidationError};
pub use reminder::clock::{Clock, FixedClock, SystemClock};
pub use reminder::delivery::{DeliveryHandler, DeliveryReport};
pub use reminder::dispatcher::{DispatchOutcome, JobOutcome, ReminderDispatcher};
pub use reminder::facility::{JobKind, JobPayload};
pub use reminder::outbox::{PlatformCommand, PlatformOutbox};
pub use reminder::policy::ReminderPolicy;
pub use reminder::scheduler::{ReminderScheduler, ScheduleOutcome};
pub use reminder::ReminderRuntime;
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskRepository};
pub use service::task_service::{TaskService, TaskStatistics};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
