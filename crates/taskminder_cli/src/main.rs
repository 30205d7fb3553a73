//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `taskminder_core` linkage without the Flutter runtime.
//! - Exercise one in-memory reminder cycle with deterministic output.

use std::sync::Arc;
use taskminder_core::{
    open_db_in_memory, FixedClock, NewTask, Priority, ReminderRuntime, SqliteTaskRepository,
};

const SMOKE_NOW_MS: i64 = 1_700_000_000_000;

fn main() {
    println!("taskminder_core ping={}", taskminder_core::ping());
    println!("taskminder_core version={}", taskminder_core::core_version());

    if let Err(err) = reminder_smoke() {
        eprintln!("taskminder_core reminder_smoke=error {err}");
        std::process::exit(1);
    }
}

fn reminder_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db_in_memory()?;
    let clock = Arc::new(FixedClock::new(SMOKE_NOW_MS));
    let runtime = ReminderRuntime::with_default_policy(true, clock.clone());
    let service = runtime.task_service(SqliteTaskRepository::new(&conn));

    let reminder_at = SMOKE_NOW_MS + 60_000;
    for (title, priority) in [("smoke-low", Priority::Low), ("smoke-high", Priority::High)] {
        service.add_task(NewTask {
            reminder_at: Some(reminder_at),
            priority,
            ..NewTask::new(title)
        })?;
    }
    println!(
        "taskminder_core scheduled_commands={}",
        runtime.outbox().drain().len()
    );

    clock.set(reminder_at);
    let outcome = runtime
        .dispatcher(SqliteTaskRepository::new(&conn))
        .on_alarm_fired(Some(reminder_at));
    println!("taskminder_core dispatch={outcome:?}");
    Ok(())
}
