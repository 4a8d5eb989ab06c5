//! Pipeline tasks
//!
//! Each task reads its inputs from the host, does its work and returns a
//! [`TaskResult`]. [`finish`] is the task boundary: it reports the outcome to
//! the host, turning any error into a failed result.

pub mod android_signing;
pub mod docker_push;

use pipetask_core::domain::task::{TaskResult, TaskStatus};

use crate::error::Result;
use crate::host::TaskHost;

/// Reports a task's outcome to the host
pub fn finish(host: &dyn TaskHost, result: Result<TaskResult>) -> TaskResult {
    match result {
        Ok(result) => {
            host.complete(result.status, &result.message);
            result
        }
        Err(e) => {
            let message = e.to_string();
            host.complete(TaskStatus::Failed, &message);
            TaskResult::failed(message)
        }
    }
}
