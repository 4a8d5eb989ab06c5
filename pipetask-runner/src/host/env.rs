//! Agent-backed task host
//!
//! The agent hands a task its configuration through environment variables and
//! reads structured commands back from stdout:
//! - inputs: `INPUT_<NAME>`
//! - variables: `<NAME>` with `.` replaced by `_`, upper-cased
//! - task variables: `VSTS_TASKVARIABLE_<NAME>`
//! - endpoints: `ENDPOINT_URL_<ID>` and `ENDPOINT_AUTH_PARAMETER_<ID>_<KEY>`

use pipetask_core::domain::log::LogLevel;
use pipetask_core::domain::task::TaskStatus;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::TaskHost;

/// Task host speaking the agent's environment/stdout protocol
///
/// The environment is captured once at construction.
pub struct EnvTaskHost {
    vars: HashMap<String, String>,
}

impl EnvTaskHost {
    /// Host over the process environment
    pub fn new() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Host over an explicit set of environment variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`; blank values read as unset
    fn read(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn emit(line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            warn!("Failed to write agent command: {}", e);
        }
    }
}

impl Default for EnvTaskHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment key of an input (`dockerFile` -> `INPUT_DOCKERFILE`)
pub(crate) fn input_key(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Environment key of a variable (`Build.BuildId` -> `BUILD_BUILDID`)
pub(crate) fn variable_key(name: &str) -> String {
    name.replace(['.', ' '], "_").to_uppercase()
}

/// Escapes a value for use inside a logging command
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escapes a logging command property value
fn escape_property(value: &str) -> String {
    escape_data(value).replace(']', "%5D").replace(';', "%3B")
}

impl TaskHost for EnvTaskHost {
    fn input(&self, name: &str) -> Option<String> {
        self.read(&input_key(name)).map(|v| v.trim().to_string())
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.read(&variable_key(name))
    }

    fn task_variable(&self, name: &str) -> Option<String> {
        self.read(&format!("VSTS_TASKVARIABLE_{}", variable_key(name)))
    }

    fn endpoint_url(&self, endpoint_id: &str) -> Option<String> {
        self.read(&format!("ENDPOINT_URL_{}", endpoint_id))
    }

    fn endpoint_auth_parameter(&self, endpoint_id: &str, key: &str) -> Option<String> {
        self.read(&format!(
            "ENDPOINT_AUTH_PARAMETER_{}_{}",
            endpoint_id,
            key.to_uppercase()
        ))
    }

    fn set_variable(&self, name: &str, value: &str) {
        debug!("Setting variable {}", name);
        Self::emit(&format!(
            "##vso[task.setvariable variable={};]{}",
            escape_property(name),
            escape_data(value)
        ));
    }

    fn which(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }

    fn find_match(&self, pattern: &str) -> Vec<PathBuf> {
        match glob::glob(pattern) {
            Ok(paths) => {
                let mut matches: Vec<PathBuf> = paths.filter_map(|p| p.ok()).collect();
                matches.sort();
                matches
            }
            Err(e) => {
                warn!("Invalid file pattern '{}': {}", pattern, e);
                Vec::new()
            }
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => {
                debug!("{}", message);
                Self::emit(&format!("##vso[task.debug]{}", escape_data(message)));
            }
            LogLevel::Info => {
                info!("{}", message);
                Self::emit(message);
            }
            LogLevel::Warning => {
                warn!("{}", message);
                Self::emit(&format!(
                    "##vso[task.issue type=warning;]{}",
                    escape_data(message)
                ));
            }
            LogLevel::Error => {
                error!("{}", message);
                Self::emit(&format!(
                    "##vso[task.issue type=error;]{}",
                    escape_data(message)
                ));
            }
        }
    }

    fn complete(&self, status: TaskStatus, message: &str) {
        if status == TaskStatus::Failed {
            self.error(message);
        }
        Self::emit(&format!(
            "##vso[task.complete result={};]{}",
            status,
            escape_data(message)
        ));
    }
}
