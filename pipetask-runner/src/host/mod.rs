//! Task host abstraction
//!
//! Everything a task needs from the agent that launched it: declared inputs,
//! build variables, service endpoints, tool lookup and the logging commands the
//! agent turns into timeline records.
//!
//! Two implementations are provided:
//! - [`EnvTaskHost`]: the real agent protocol (environment variables in,
//!   `##vso[...]` commands out)
//! - `MockTaskHost`: canned answers and captured output for tests, behind
//!   the `test-util` feature

mod env;
#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use env::EnvTaskHost;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTaskHost;

use pipetask_core::domain::log::LogLevel;
use pipetask_core::domain::task::TaskStatus;
use std::path::{Path, PathBuf};

use crate::error::{Result, TaskError};

/// Access to the agent running a task
///
/// Implementations must be Send + Sync so a host can be shared with async tasks.
pub trait TaskHost: Send + Sync {
    /// Raw value of a task input, `None` when unset or blank
    fn input(&self, name: &str) -> Option<String>;

    /// Value of a build or system variable (e.g. `Build.BuildId`)
    fn variable(&self, name: &str) -> Option<String>;

    /// Value of a variable scoped to this task (set by a pre-job step)
    fn task_variable(&self, name: &str) -> Option<String>;

    /// URL of a service endpoint
    fn endpoint_url(&self, endpoint_id: &str) -> Option<String>;

    /// Authorization parameter of a service endpoint (e.g. `username`)
    fn endpoint_auth_parameter(&self, endpoint_id: &str, key: &str) -> Option<String>;

    /// Sets a pipeline variable visible to later steps
    fn set_variable(&self, name: &str, value: &str);

    /// Locates a tool on the agent's PATH
    fn which(&self, tool: &str) -> Option<PathBuf>;

    /// Expands a file pattern into matching paths
    fn find_match(&self, pattern: &str) -> Vec<PathBuf>;

    /// Whether a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Writes a log line at the given level
    fn log(&self, level: LogLevel, message: &str);

    /// Reports the final task result to the agent
    fn complete(&self, status: TaskStatus, message: &str);

    /// Value of an input the task cannot run without
    fn required_input(&self, name: &str) -> Result<String> {
        self.input(name)
            .ok_or_else(|| TaskError::MissingInput(name.to_string()))
    }

    /// Boolean input; only a case-insensitive `true` counts
    fn bool_input(&self, name: &str) -> bool {
        self.input(name)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Input split on `delimiter`, with entries trimmed and blanks dropped
    fn delimited_input(&self, name: &str, delimiter: char) -> Vec<String> {
        self.input(name)
            .map(|value| {
                value
                    .split(delimiter)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}
