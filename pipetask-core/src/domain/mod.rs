//! Core domain types
//!
//! Types describing what a task does while it runs. They are shared between
//! the task host (which records and reports them) and the tasks themselves.

pub mod log;
pub mod task;
