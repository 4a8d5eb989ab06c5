//! Container registry connection
//!
//! Holds the credentials of a docker-registry service endpoint and knows which
//! registries the agent is already logged in to:
//! - Qualifying repository names with a registry host
//! - Reading logged-in registries from the docker `config.json`
//! - Writing a private `config.json` so docker commands use the endpoint's
//!   credentials without touching the agent user's login state

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, TaskError};
use crate::host::TaskHost;

/// Registry host that docker treats as the default and never prefixes
const DOCKER_HUB_INDEX: &str = "index.docker.io";

/// Credentials of a docker-registry service endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    /// Registry URL or host (e.g. `https://myregistry.azurecr.io`)
    pub registry: String,
    pub username: String,
    pub password: String,
}

impl RegistryAuth {
    /// Reads the credentials of endpoint `endpoint_id` from the host
    pub fn from_endpoint(host: &dyn TaskHost, endpoint_id: &str) -> Result<Self> {
        let missing = |what: &str| TaskError::Endpoint {
            endpoint: endpoint_id.to_string(),
            message: format!("{} is not set", what),
        };

        let registry = host
            .endpoint_auth_parameter(endpoint_id, "registry")
            .or_else(|| host.endpoint_url(endpoint_id))
            .ok_or_else(|| missing("registry"))?;
        let username = host
            .endpoint_auth_parameter(endpoint_id, "username")
            .ok_or_else(|| missing("username"))?;
        let password = host
            .endpoint_auth_parameter(endpoint_id, "password")
            .ok_or_else(|| missing("password"))?;

        Ok(Self {
            registry,
            username,
            password,
        })
    }
}

/// Docker `config.json` contents relevant to registry logins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

/// Authentication entry in the docker config
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthEntry {
    /// Base64-encoded "username:password"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
}

impl DockerConfig {
    /// Directory docker reads its config from (`DOCKER_CONFIG`, else `~/.docker`)
    pub fn default_dir() -> Option<PathBuf> {
        match std::env::var_os("DOCKER_CONFIG") {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
            _ => dirs::home_dir().map(|home| home.join(".docker")),
        }
    }

    /// Loads `config.json` from `dir`; a missing file is an empty config
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents =
            fs::read_to_string(&path).map_err(|e| TaskError::io("Failed to read", &path, e))?;

        serde_json::from_str(&contents).map_err(|e| {
            TaskError::io(
                "Failed to parse",
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Config holding a single login
    pub fn with_login(auth: &RegistryAuth) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", auth.username, auth.password));

        let mut auths = BTreeMap::new();
        auths.insert(
            auth.registry.clone(),
            AuthEntry {
                auth: Some(encoded),
            },
        );
        Self { auths }
    }

    /// Writes `config.json` into `dir`, creating the directory
    ///
    /// On unix the file is readable by its owner only.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| TaskError::io("Failed to create", dir, e))?;

        let path = dir.join("config.json");
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            TaskError::io(
                "Failed to serialize",
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        write_private(&path, contents.as_bytes())
            .map_err(|e| TaskError::io("Failed to write", &path, e))?;

        Ok(path)
    }

    /// Registries with a stored login, in sorted order
    pub fn registries(&self) -> Vec<String> {
        self.auths.keys().cloned().collect()
    }
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(contents)
}

/// Connection to a container registry for one task run
#[derive(Debug)]
pub struct ContainerConnection {
    registry_auth: Option<RegistryAuth>,

    /// Docker config consulted for existing logins
    user_config_dir: Option<PathBuf>,

    /// Private docker config written by `open()`
    config_dir: Option<PathBuf>,
}

impl ContainerConnection {
    /// Creates a connection, optionally bound to endpoint credentials
    pub fn new(registry_auth: Option<RegistryAuth>) -> Self {
        Self {
            registry_auth,
            user_config_dir: DockerConfig::default_dir(),
            config_dir: None,
        }
    }

    /// Creates a connection for the endpoint named by `endpoint_id`, if any
    pub fn from_host(host: &dyn TaskHost, endpoint_id: Option<&str>) -> Result<Self> {
        let registry_auth = endpoint_id
            .map(|id| RegistryAuth::from_endpoint(host, id))
            .transpose()?;
        Ok(Self::new(registry_auth))
    }

    /// Overrides where existing logins are read from
    pub fn with_user_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_config_dir = Some(dir.into());
        self
    }

    /// Repository qualified with the endpoint's registry
    ///
    /// # Returns
    /// `None` when no endpoint is configured or the repository is empty
    pub fn qualified_image_name(&self, repository: &str) -> Option<String> {
        if repository.is_empty() {
            return None;
        }
        let auth = self.registry_auth.as_ref()?;
        Some(prefix_registry(&auth.registry, repository))
    }

    /// Repository qualified with every registry the agent is logged in to
    pub fn qualified_image_names_from_config(&self, repository: &str) -> Vec<String> {
        if repository.is_empty() {
            return Vec::new();
        }

        let Some(dir) = &self.user_config_dir else {
            debug!("No docker config directory available");
            return Vec::new();
        };

        let config = match DockerConfig::load_from_dir(dir) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable docker config: {}", e);
                return Vec::new();
            }
        };

        config
            .registries()
            .iter()
            .map(|registry| prefix_registry(registry, repository))
            .collect()
    }

    /// Writes the endpoint's login to a private docker config
    ///
    /// Without endpoint credentials this is a no-op and docker keeps using the
    /// agent user's own config.
    pub fn open(&mut self, temp_dir: &Path) -> Result<()> {
        let Some(auth) = &self.registry_auth else {
            return Ok(());
        };

        let dir = temp_dir.join(format!("DockerConfig_{}", uuid::Uuid::new_v4()));
        DockerConfig::with_login(auth).write_to_dir(&dir)?;
        info!("Logged in to {} for this task", auth.registry);

        self.config_dir = Some(dir);
        Ok(())
    }

    /// Value for `DOCKER_CONFIG` when the connection has been opened
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    /// Removes the private docker config
    pub fn close(&mut self) {
        if let Some(dir) = self.config_dir.take() {
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!("Removed docker config {}", dir.display()),
                Err(e) => warn!("Failed to remove docker config {}: {}", dir.display(), e),
            }
        }
    }
}

impl Drop for ContainerConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Joins a registry host and a repository
///
/// The registry may be a bare host or a URL; only its host (and port) is used.
/// Docker Hub's index host is left off.
pub fn prefix_registry(registry: &str, repository: &str) -> String {
    if registry.is_empty() {
        return repository.to_string();
    }

    let host = if registry.contains("://") {
        match reqwest::Url::parse(registry) {
            Ok(url) => match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                _ => registry.to_string(),
            },
            Err(_) => registry.to_string(),
        }
    } else {
        registry.trim_end_matches('/').to_string()
    };

    if host.eq_ignore_ascii_case(DOCKER_HUB_INDEX) {
        repository.to_string()
    } else {
        format!("{}/{}", host, repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockTaskHost;

    fn auth(registry: &str) -> RegistryAuth {
        RegistryAuth {
            registry: registry.to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[test]
    fn test_prefix_registry() {
        assert_eq!(
            prefix_registry("https://myregistry.azurecr.io", "app"),
            "myregistry.azurecr.io/app"
        );
        assert_eq!(
            prefix_registry("https://localhost:5000/", "app"),
            "localhost:5000/app"
        );
        assert_eq!(prefix_registry("registry.example.com", "app"), "registry.example.com/app");
        assert_eq!(prefix_registry("https://index.docker.io/v1/", "user/app"), "user/app");
        assert_eq!(prefix_registry("", "app"), "app");
    }

    #[test]
    fn test_qualified_image_name_requires_endpoint() {
        let anonymous = ContainerConnection::new(None);
        assert_eq!(anonymous.qualified_image_name("app"), None);

        let connection = ContainerConnection::new(Some(auth("https://registry.example.com")));
        assert_eq!(
            connection.qualified_image_name("myrepo").as_deref(),
            Some("registry.example.com/myrepo")
        );
        assert_eq!(connection.qualified_image_name(""), None);
    }

    #[test]
    fn test_qualified_image_names_from_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{
                "auths": {
                    "registry.example.com": { "auth": "dXNlcjpwYXNz" },
                    "https://index.docker.io/v1/": {},
                    "ghcr.io": { "auth": "dXNlcjpwYXNz" }
                },
                "credsStore": "desktop"
            }"#,
        )
        .unwrap();

        let connection = ContainerConnection::new(None).with_user_config_dir(dir.path());
        assert_eq!(
            connection.qualified_image_names_from_config("myrepo"),
            vec!["ghcr.io/myrepo", "myrepo", "registry.example.com/myrepo"]
        );
        assert!(connection.qualified_image_names_from_config("").is_empty());
    }

    #[test]
    fn test_qualified_image_names_without_logins() {
        let dir = tempfile::tempdir().unwrap();
        let connection = ContainerConnection::new(None).with_user_config_dir(dir.path());
        assert!(connection.qualified_image_names_from_config("myrepo").is_empty());

        fs::write(dir.path().join("config.json"), "not json").unwrap();
        assert!(connection.qualified_image_names_from_config("myrepo").is_empty());
    }

    #[test]
    fn test_open_writes_private_config_and_close_removes_it() {
        let temp = tempfile::tempdir().unwrap();
        let mut connection = ContainerConnection::new(Some(auth("registry.example.com")));

        connection.open(temp.path()).unwrap();
        let dir = connection.config_dir().unwrap().to_path_buf();
        assert!(dir.starts_with(temp.path()));

        let written = DockerConfig::load_from_dir(&dir).unwrap();
        assert_eq!(written.registries(), vec!["registry.example.com"]);
        let contents = fs::read_to_string(dir.join("config.json")).unwrap();
        assert!(contents.contains("dXNlcjpwYXNz"));

        connection.close();
        assert!(connection.config_dir().is_none());
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let mut connection = ContainerConnection::new(Some(auth("registry.example.com")));
        connection.open(temp.path()).unwrap();

        let config = connection.config_dir().unwrap().join("config.json");
        let mode = fs::metadata(&config).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_open_without_endpoint_is_noop() {
        let temp = tempfile::tempdir().unwrap();
        let mut connection = ContainerConnection::new(None);
        connection.open(temp.path()).unwrap();
        assert!(connection.config_dir().is_none());
    }

    #[test]
    fn test_registry_auth_from_endpoint() {
        let host = MockTaskHost::new()
            .with_endpoint_auth("acr", "registry", "https://myregistry.azurecr.io")
            .with_endpoint_auth("acr", "username", "user")
            .with_endpoint_auth("acr", "password", "pass");

        let auth = RegistryAuth::from_endpoint(&host, "acr").unwrap();
        assert_eq!(auth.registry, "https://myregistry.azurecr.io");
        assert_eq!(auth.username, "user");

        let host = MockTaskHost::new()
            .with_endpoint_url("hub", "https://index.docker.io/v1/")
            .with_endpoint_auth("hub", "username", "user");
        let err = RegistryAuth::from_endpoint(&host, "hub").unwrap_err();
        assert!(err.to_string().contains("password is not set"));
    }
}
