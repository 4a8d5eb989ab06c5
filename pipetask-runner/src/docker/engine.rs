//! Container engine
//!
//! The seam between tasks and the tool that talks to registries. `DockerCli`
//! drives the docker command line; tests substitute their own engine.

use async_trait::async_trait;
use pipetask_core::dto::image_details::LayerInfo;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::docker::connection::ContainerConnection;
use crate::error::{Result, TaskError};
use crate::host::TaskHost;
use crate::tool::ToolRunner;

/// Format of one `docker history` row: created-by, size, created-at
const HISTORY_FORMAT: &str = "{{.CreatedBy}}\t{{.Size}}\t{{.CreatedAt}}";

/// Operations a task needs from a container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pushes `image` to its registry
    ///
    /// # Returns
    /// The raw text output of the push
    async fn push(&self, image: &str, arguments: &[String]) -> Result<String>;

    /// Build history of the image identified by `image_uri`
    async fn layers(&self, image_uri: &str) -> Result<Vec<LayerInfo>>;
}

/// Container engine backed by the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker_path: PathBuf,

    /// `DOCKER_CONFIG` for every invocation, when the connection has one
    config_dir: Option<PathBuf>,
}

impl DockerCli {
    pub fn new(docker_path: impl Into<PathBuf>, connection: &ContainerConnection) -> Self {
        Self {
            docker_path: docker_path.into(),
            config_dir: connection.config_dir().map(PathBuf::from),
        }
    }

    /// Locates docker on the agent
    pub fn locate(host: &dyn TaskHost, connection: &ContainerConnection) -> Result<Self> {
        let docker_path = host.which("docker").ok_or_else(|| {
            TaskError::tool_not_found("docker", "Install docker on the agent and add it to PATH.")
        })?;
        debug!("Using docker at {}", docker_path.display());
        Ok(Self::new(docker_path, connection))
    }

    fn command(&self) -> ToolRunner {
        let runner = ToolRunner::new(&self.docker_path);
        match &self.config_dir {
            Some(dir) => runner.env("DOCKER_CONFIG", dir.as_os_str()),
            None => runner,
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn push(&self, image: &str, arguments: &[String]) -> Result<String> {
        info!("Pushing {}", image);

        let output = self
            .command()
            .arg("push")
            .args(arguments.iter().cloned())
            .arg(image)
            .exec()
            .await?;

        if !output.success() {
            let reason = if output.stderr.trim().is_empty() {
                format!("docker exited with code {}", output.exit_code)
            } else {
                output.stderr.trim().to_string()
            };
            return Err(TaskError::PushFailed {
                image: image.to_string(),
                reason,
            });
        }

        Ok(output.stdout)
    }

    async fn layers(&self, image_uri: &str) -> Result<Vec<LayerInfo>> {
        let reference = image_uri
            .strip_prefix("https://")
            .unwrap_or(image_uri);

        let output = self
            .command()
            .arg("history")
            .arg("--no-trunc")
            .arg("--format")
            .arg(HISTORY_FORMAT)
            .arg(reference)
            .exec_checked()
            .await?;

        Ok(parse_history(&output.stdout))
    }
}

/// Parses `docker history` output written with [`HISTORY_FORMAT`]
pub fn parse_history(output: &str) -> Vec<LayerInfo> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_history_line)
        .collect()
}

fn parse_history_line(line: &str) -> LayerInfo {
    let mut fields = line.split('\t');
    let created_by = fields.next().unwrap_or_default().trim();
    let size = fields.next().unwrap_or_default().trim().to_string();
    let created_on = fields.next().unwrap_or_default().trim().to_string();

    let (directive, arguments) = split_directive(created_by);

    LayerInfo {
        directive,
        arguments,
        size,
        created_on,
    }
}

/// Splits a history `CreatedBy` entry into instruction and arguments
///
/// Classic builds record `/bin/sh -c #(nop) CMD [...]` for metadata steps and
/// `/bin/sh -c <command>` for RUN steps; BuildKit records the instruction
/// itself.
fn split_directive(created_by: &str) -> (String, String) {
    let command = created_by
        .strip_prefix("/bin/sh -c ")
        .map(str::trim_start);

    let text = match command {
        Some(rest) => match rest.strip_prefix("#(nop)") {
            Some(nop) => nop.trim(),
            None => return ("RUN".to_string(), rest.trim().to_string()),
        },
        None => created_by,
    };

    let (first, rest) = match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (text, ""),
    };

    let is_instruction = !first.is_empty()
        && first
            .chars()
            .all(|c| c.is_ascii_uppercase());

    if is_instruction {
        (first.to_string(), rest.to_string())
    } else {
        ("RUN".to_string(), text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_history_classic_builder() {
        let output = "/bin/sh -c #(nop)  CMD [\"sh\"]\t0B\t2024-01-01T00:00:00Z\n\
                      /bin/sh -c apk add --no-cache curl\t5.2MB\t2024-01-01T00:00:00Z\n\
                      /bin/sh -c #(nop) ADD file:abc in / \t7.4MB\t2023-12-01T00:00:00Z\n";

        let layers = parse_history(output);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].directive, "CMD");
        assert_eq!(layers[0].arguments, "[\"sh\"]");
        assert_eq!(layers[0].size, "0B");
        assert_eq!(layers[1].directive, "RUN");
        assert_eq!(layers[1].arguments, "apk add --no-cache curl");
        assert_eq!(layers[2].directive, "ADD");
        assert_eq!(layers[2].arguments, "file:abc in /");
        assert_eq!(layers[2].created_on, "2023-12-01T00:00:00Z");
    }

    #[test]
    fn test_parse_history_buildkit() {
        let output = "RUN /bin/sh -c go build ./... # buildkit\t12MB\t2024-01-01T00:00:00Z\n\
                      WORKDIR /src\t0B\t2024-01-01T00:00:00Z\n\n";

        let layers = parse_history(output);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].directive, "RUN");
        assert_eq!(layers[0].arguments, "/bin/sh -c go build ./... # buildkit");
        assert_eq!(layers[1].directive, "WORKDIR");
        assert_eq!(layers[1].arguments, "/src");
    }

    #[test]
    fn test_parse_history_unrecognised_entry() {
        let layers = parse_history("custom-tool --flag\t1kB\t");
        assert_eq!(layers[0].directive, "RUN");
        assert_eq!(layers[0].arguments, "custom-tool --flag");
        assert_eq!(layers[0].created_on, "");
    }

    /// Executable shell script, closed before it is run
    #[cfg(unix)]
    fn fake_docker(dir: &std::path::Path, body: &str) -> tempfile::TempPath {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::Builder::new()
            .prefix("docker")
            .tempfile_in(dir)
            .unwrap();
        write!(file, "#!/bin/sh\n{}", body).unwrap();
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))
            .unwrap();
        file.into_temp_path()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_docker_cli_push_uses_private_config() {
        let dir = tempfile::tempdir().unwrap();
        let fake = fake_docker(
            dir.path(),
            "echo \"config=$DOCKER_CONFIG args=$*\"\necho \"v1: digest: sha256:feed size: 528\"\n",
        );

        let mut connection = ContainerConnection::new(Some(crate::docker::RegistryAuth {
            registry: "registry.example.com".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        }));
        connection.open(dir.path()).unwrap();
        let config_dir = connection.config_dir().unwrap().display().to_string();

        let docker = DockerCli::new(fake.to_path_buf(), &connection);
        let output = docker
            .push("registry.example.com/app:v1", &["-q".to_string()])
            .await
            .unwrap();

        assert!(output.contains(&format!("config={}", config_dir)));
        assert!(output.contains("args=push -q registry.example.com/app:v1"));
        assert!(output.contains("sha256:feed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_docker_cli_push_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fake = fake_docker(dir.path(), "echo 'denied: requested access' >&2\nexit 1\n");

        let docker = DockerCli::new(fake.to_path_buf(), &ContainerConnection::new(None));
        let err = docker.push("app:v1", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::PushFailed { ref image, ref reason } if image == "app:v1" && reason == "denied: requested access"
        ));
    }
}
