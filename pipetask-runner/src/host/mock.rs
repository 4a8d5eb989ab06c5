//! In-memory task host for tests
//!
//! Mirrors the agent's mock runner: inputs, variables and tool lookups are
//! answered from canned tables, while logs, variables and the final result are
//! captured for assertions.

use pipetask_core::domain::log::{LogEntry, LogLevel};
use pipetask_core::domain::task::TaskStatus;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::TaskHost;

/// Task host with canned answers
#[derive(Debug, Default)]
pub struct MockTaskHost {
    inputs: HashMap<String, String>,
    variables: HashMap<String, String>,
    task_variables: HashMap<String, String>,
    endpoint_urls: HashMap<String, String>,
    endpoint_auth: HashMap<(String, String), String>,
    which: HashMap<String, PathBuf>,
    find_match: HashMap<String, Vec<PathBuf>>,
    exists: HashMap<PathBuf, bool>,

    logs: Mutex<Vec<LogEntry>>,
    set_variables: Mutex<HashMap<String, String>>,
    result: Mutex<Option<(TaskStatus, String)>>,
}

impl MockTaskHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str, value: &str) -> Self {
        self.inputs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_task_variable(mut self, name: &str, value: &str) -> Self {
        self.task_variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_id: &str, url: &str) -> Self {
        self.endpoint_urls
            .insert(endpoint_id.to_string(), url.to_string());
        self
    }

    pub fn with_endpoint_auth(mut self, endpoint_id: &str, key: &str, value: &str) -> Self {
        self.endpoint_auth.insert(
            (endpoint_id.to_string(), key.to_lowercase()),
            value.to_string(),
        );
        self
    }

    /// Answers `which(tool)` with `path`; unanswered tools are not found
    pub fn with_which(mut self, tool: &str, path: impl Into<PathBuf>) -> Self {
        self.which.insert(tool.to_string(), path.into());
        self
    }

    /// Answers `find_match(pattern)`; unanswered patterns are globbed on disk
    pub fn with_find_match(mut self, pattern: &str, matches: Vec<PathBuf>) -> Self {
        self.find_match.insert(pattern.to_string(), matches);
        self
    }

    /// Answers `exists(path)`; unanswered paths are checked on disk
    pub fn with_exists(mut self, path: impl Into<PathBuf>, exists: bool) -> Self {
        self.exists.insert(path.into(), exists);
        self
    }

    /// Captured messages at one level
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Value passed to `set_variable`, if any
    pub fn set_variable_value(&self, name: &str) -> Option<String> {
        self.set_variables.lock().unwrap().get(name).cloned()
    }

    /// Status and message passed to `complete`
    pub fn result(&self) -> Option<(TaskStatus, String)> {
        self.result.lock().unwrap().clone()
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.result(), Some((TaskStatus::Succeeded, _)))
    }

    pub fn failed(&self) -> bool {
        matches!(self.result(), Some((TaskStatus::Failed, _)))
    }

    /// Message the task failed with
    pub fn failure_message(&self) -> Option<String> {
        match self.result() {
            Some((TaskStatus::Failed, message)) => Some(message),
            _ => None,
        }
    }
}

impl TaskHost for MockTaskHost {
    fn input(&self, name: &str) -> Option<String> {
        self.inputs
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned().filter(|v| !v.is_empty())
    }

    fn task_variable(&self, name: &str) -> Option<String> {
        self.task_variables
            .get(name)
            .cloned()
            .filter(|v| !v.is_empty())
    }

    fn endpoint_url(&self, endpoint_id: &str) -> Option<String> {
        self.endpoint_urls.get(endpoint_id).cloned()
    }

    fn endpoint_auth_parameter(&self, endpoint_id: &str, key: &str) -> Option<String> {
        self.endpoint_auth
            .get(&(endpoint_id.to_string(), key.to_lowercase()))
            .cloned()
    }

    fn set_variable(&self, name: &str, value: &str) {
        self.set_variables
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn which(&self, tool: &str) -> Option<PathBuf> {
        self.which.get(tool).cloned()
    }

    fn find_match(&self, pattern: &str) -> Vec<PathBuf> {
        if let Some(matches) = self.find_match.get(pattern) {
            return matches.clone();
        }

        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .map(|paths| paths.filter_map(|p| p.ok()).collect())
            .unwrap_or_default();
        matches.sort();
        matches
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists
            .get(path)
            .copied()
            .unwrap_or_else(|| path.exists())
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.logs
            .lock()
            .unwrap()
            .push(LogEntry::now(level, message));
    }

    fn complete(&self, status: TaskStatus, message: &str) {
        *self.result.lock().unwrap() = Some((status, message.to_string()));
    }
}
