//! Error types for task execution

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for task operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that fail a task
#[derive(Debug, Error)]
pub enum TaskError {
    /// A required input was not supplied
    #[error("Input required: {0}")]
    MissingInput(String),

    /// The Dockerfile input did not resolve to an existing file
    #[error("No Dockerfile matching {0} was found.")]
    DockerfileNotFound(String),

    /// An external tool could not be located
    #[error("{tool} not found. {hint}")]
    ToolNotFound {
        tool: String,
        hint: String,
    },

    /// An external tool ran but exited unsuccessfully
    #[error("{tool} failed with exit code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    /// Pushing an image to its registry failed
    #[error("Failed to push image {image}: {reason}")]
    PushFailed { image: String, reason: String },

    /// The file pattern matched nothing
    #[error("No matching files were found with search pattern: {0}")]
    NoMatchingFiles(String),

    /// A service endpoint is missing data the task needs
    #[error("Service endpoint {endpoint}: {message}")]
    Endpoint { endpoint: String, message: String },

    /// Filesystem error on a specific path
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub fn tool_not_found(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_message() {
        let err = TaskError::tool_not_found("jarsigner", "Set JAVA_HOME.");
        assert_eq!(err.to_string(), "jarsigner not found. Set JAVA_HOME.");
    }

    #[test]
    fn test_io_message_names_path() {
        let err = TaskError::io(
            "Failed to read",
            "/src/Dockerfile",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "Failed to read /src/Dockerfile: missing");
    }
}
