//! Task output files
//!
//! Tasks record the raw output of the tools they ran in a file under the agent
//! temp directory so later steps can consume it.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TaskError};

/// Writes `content` to `{temp_dir}/task_outputs/{category}_{millis}.txt`
///
/// # Returns
/// Path of the written file
pub fn write_task_output(temp_dir: &Path, category: &str, content: &str) -> Result<PathBuf> {
    let dir = temp_dir.join("task_outputs");
    fs::create_dir_all(&dir).map_err(|e| TaskError::io("Failed to create", &dir, e))?;

    let path = dir.join(format!(
        "{}_{}.txt",
        category,
        chrono::Utc::now().timestamp_millis()
    ));
    fs::write(&path, content).map_err(|e| TaskError::io("Failed to write", &path, e))?;

    debug!("Task output written to {}", path.display());
    Ok(path)
}
