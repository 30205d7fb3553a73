//! Flutter bridge for the TaskMinder core.

pub mod api;
