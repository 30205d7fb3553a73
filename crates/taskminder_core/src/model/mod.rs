//! Task domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep closed priority/status sets and validation in one place.
//!
//! # Invariants
//! - Every persisted task is identified by a store-assigned `TaskId`.
//! - Validation runs before any value reaches the store.

pub mod filter;
pub mod task;
