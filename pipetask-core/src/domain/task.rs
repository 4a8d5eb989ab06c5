//! Task domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final status reported to the host when a task finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "Succeeded"),
            TaskStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Result of a task invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub message: String,
    /// Path of the task output file, when the task wrote one
    pub output_path: Option<String>,
}

impl TaskResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            message: message.into(),
            output_path: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            message: message.into(),
            output_path: None,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    /// Process exit code for this result
    pub fn exit_code(&self) -> i32 {
        match self.status {
            TaskStatus::Succeeded => 0,
            TaskStatus::Failed => 1,
        }
    }
}
