//! External tool execution
//!
//! Runs command-line tools with captured output:
//! - Building argument lists, including free-form argument lines
//! - Masking secret arguments in logged command lines
//! - Capturing stdout/stderr and the exit code

use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, TaskError};

/// Captured result of a tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builder for a single tool invocation
#[derive(Debug, Clone)]
pub struct ToolRunner {
    path: PathBuf,
    args: Vec<String>,
    secret_args: Vec<usize>,
    envs: Vec<(String, OsString)>,
}

impl ToolRunner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            secret_args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an argument that is masked in logged command lines
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends a free-form argument line, split like a shell would
    pub fn line(self, line: &str) -> Self {
        self.args(split_command_line(line))
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Short tool name used in messages
    pub fn tool_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Command line with secret arguments masked
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.path.display().to_string()];
        for (idx, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&idx) {
                parts.push("***".to_string());
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }

    /// Runs the tool and captures its output, whatever the exit code
    pub async fn exec(&self) -> Result<ToolOutput> {
        debug!("Executing: {}", self.command_line());

        let mut command = Command::new(&self.path);
        command.args(&self.args);
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let output = command
            .output()
            .await
            .map_err(|e| TaskError::io("Failed to execute", &self.path, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if !stdout.trim().is_empty() {
            debug!("{} stdout: {}", self.tool_name(), stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.tool_name(), stderr.trim());
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// Runs the tool and fails unless it exits with code 0
    pub async fn exec_checked(&self) -> Result<ToolOutput> {
        let output = self.exec().await?;

        if !output.success() {
            return Err(TaskError::ToolFailed {
                tool: self.tool_name(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// Splits an argument line into arguments
///
/// Whitespace separates arguments; double quotes group, and `\"` inside quotes
/// is a literal quote.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut has_token = false;

    for c in line.chars() {
        if escaped {
            if c != '"' {
                current.push('\\');
            }
            current.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' if in_quotes => escaped = true,
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if escaped {
        current.push('\\');
    }
    if has_token {
        args.push(current);
    }

    args
}
