//! Build configuration
//!
//! Build identifiers and agent locations a task needs, read once from the host
//! at task entry and passed down explicitly.

use std::path::PathBuf;

use crate::host::TaskHost;

/// Variables describing the build a task runs in
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Numeric build id (`Build.BuildId`), `None` when absent or not a number
    pub build_id: Option<i64>,

    /// Build pipeline name (`Build.DefinitionName`)
    pub definition_name: String,

    /// Build number (`Build.BuildNumber`)
    pub build_number: String,

    /// Build pipeline id (`System.DefinitionId`)
    pub definition_id: String,

    /// Project collection URI (`System.TeamFoundationCollectionUri`)
    pub collection_uri: String,

    /// Team project name (`System.TeamProject`)
    pub team_project: String,

    /// OAuth token for the build service (`System.AccessToken`)
    pub access_token: Option<String>,

    /// Agent scratch directory (`Agent.TempDirectory`, falls back to the OS temp dir)
    pub temp_directory: PathBuf,
}

impl BuildContext {
    /// Reads the build variables from the host
    pub fn from_host(host: &dyn TaskHost) -> Self {
        let var = |name: &str| host.variable(name).unwrap_or_default();

        Self {
            build_id: host
                .variable("Build.BuildId")
                .and_then(|s| s.trim().parse::<i64>().ok()),
            definition_name: var("Build.DefinitionName"),
            build_number: var("Build.BuildNumber"),
            definition_id: var("System.DefinitionId"),
            collection_uri: var("System.TeamFoundationCollectionUri"),
            team_project: var("System.TeamProject"),
            access_token: host.variable("System.AccessToken"),
            temp_directory: host
                .variable("Agent.TempDirectory")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        }
    }

    /// Base URL of the team project (`{collection}/{project}`)
    pub fn project_url(&self) -> String {
        format!(
            "{}/{}",
            self.collection_uri.trim_end_matches('/'),
            self.team_project
        )
    }
}
