//! Pipetask Runner
//!
//! Build-pipeline tasks that drive external command-line tools and report
//! their outcome to the host agent.
//!
//! Architecture:
//! - Host: access to task inputs, variables and service endpoints, plus the
//!   logging commands understood by the agent
//! - Configuration: build identifiers read once at task entry
//! - Tools: subprocess execution with captured output
//! - Docker: registry connection, image naming helpers and the engine seam
//! - Tasks: `docker-push` and `android-signing`

pub mod config;
pub mod docker;
pub mod error;
pub mod host;
pub mod output;
pub mod tasks;
pub mod tool;

pub use config::BuildContext;
pub use error::{Result, TaskError};
pub use host::TaskHost;
