//! Reminder dispatch policy.
//!
//! # Responsibility
//! - Register redundant triggers (exact alarm first, backup job second).
//! - At fire time, deliver the highest-ranked due task and stagger the rest.
//! - At process start, deliver overdue reminders and re-register future ones.
//!
//! # Invariants
//! - Delivery is at-least-once; hosts deduplicate on notification id = task id.
//! - The dispatcher never mutates task state.
//! - All platform access goes through the `facility` ports.

pub mod clock;
pub mod delivery;
pub mod dispatcher;
pub mod facility;
pub mod outbox;
pub mod policy;
pub mod scheduler;

use crate::repo::task_repo::TaskRepository;
use crate::service::task_service::TaskService;
use clock::Clock;
use delivery::DeliveryHandler;
use dispatcher::ReminderDispatcher;
use outbox::PlatformOutbox;
use policy::{PolicyError, ReminderPolicy};
use scheduler::ReminderScheduler;
use std::sync::Arc;

/// Process-scoped reminder wiring around one `PlatformOutbox`.
///
/// Owns the delivery handler, so ringing state survives across calls that
/// build short-lived schedulers and dispatchers.
pub struct ReminderRuntime {
    outbox: Arc<PlatformOutbox>,
    clock: Arc<dyn Clock>,
    delivery: Arc<DeliveryHandler>,
}

impl ReminderRuntime {
    pub fn new(
        policy: ReminderPolicy,
        exact_alarms_allowed: bool,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self::build(policy, exact_alarms_allowed, clock))
    }

    /// Runtime with `ReminderPolicy::default()`, which always validates.
    pub fn with_default_policy(exact_alarms_allowed: bool, clock: Arc<dyn Clock>) -> Self {
        Self::build(ReminderPolicy::default(), exact_alarms_allowed, clock)
    }

    fn build(policy: ReminderPolicy, exact_alarms_allowed: bool, clock: Arc<dyn Clock>) -> Self {
        let outbox = Arc::new(PlatformOutbox::new(exact_alarms_allowed));
        let delivery = Arc::new(DeliveryHandler::new(outbox.clone(), policy));
        Self {
            outbox,
            clock,
            delivery,
        }
    }

    pub fn outbox(&self) -> &Arc<PlatformOutbox> {
        &self.outbox
    }

    pub fn delivery(&self) -> &Arc<DeliveryHandler> {
        &self.delivery
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn scheduler(&self) -> ReminderScheduler {
        ReminderScheduler::new(self.outbox.clone(), self.outbox.clone(), self.clock.clone())
    }

    pub fn dispatcher<R: TaskRepository>(&self, repo: R) -> ReminderDispatcher<R> {
        ReminderDispatcher::new(
            repo,
            self.outbox.clone(),
            self.delivery.clone(),
            self.clock.clone(),
        )
    }

    /// Task service whose mutations keep this runtime's registrations in sync.
    pub fn task_service<R: TaskRepository>(&self, repo: R) -> TaskService<R> {
        TaskService::with_reminders(repo, self.clock.clone(), self.scheduler())
    }
}
