//! docker-push task
//!
//! Pushes a repository to one or more registries:
//! - Resolving the registry-qualified image names
//! - Pushing every image × tag combination, one push at a time
//! - Extracting the digest of the last push from its output
//! - Publishing the pushed image's details to the deployment API
//!
//! Push failures fail the task. Publishing the image details is best-effort:
//! errors are logged at debug level and never fail the task.

use pipetask_client::DeploymentClient;
use pipetask_core::domain::task::TaskResult;
use pipetask_core::dto::image_details::ImageDetails;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::config::BuildContext;
use crate::docker::image::{base_image_name, find_docker_file, resource_name};
use crate::docker::{ContainerConnection, ContainerEngine, DockerCli};
use crate::error::{Result, TaskError};
use crate::host::TaskHost;
use crate::output::write_task_output;
use crate::tasks::finish;
use crate::tool::split_command_line;

/// Pipeline variable receiving the path of the push output file
pub const OUTPUT_VARIABLE: &str = "DockerOutput";

static DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sha256:([[:word:]]+)").expect("digest pattern is valid"));

/// Inputs of the docker-push task
#[derive(Debug, Clone, Default)]
pub struct DockerPushInputs {
    /// Extra arguments for every `docker push`
    pub arguments: Vec<String>,
    pub tags: Vec<String>,
    pub repository: String,
    /// Docker-registry service endpoint id
    pub container_registry: Option<String>,
    /// Dockerfile path or pattern
    pub docker_file: String,
}

impl DockerPushInputs {
    pub fn from_host(host: &dyn TaskHost) -> Result<Self> {
        Ok(Self {
            arguments: host
                .input("arguments")
                .map(|line| split_command_line(&line))
                .unwrap_or_default(),
            tags: host.delimited_input("tags", '\n'),
            repository: host.input("repository").unwrap_or_default(),
            container_registry: host.input("containerRegistry"),
            docker_file: host.required_input("dockerFile")?,
        })
    }
}

/// Output accumulated across the pushes of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushResult {
    /// Output of every push, concatenated in push order
    pub output: String,
    /// Image reference of the last push
    pub image_name: String,
    /// Digest found in the last push's output
    pub digest: String,
}

impl PushResult {
    /// Records a completed push
    pub fn record(&mut self, image: &str, output: &str) {
        self.output.push_str(output);
        self.image_name = image.to_string();
        self.digest = extract_digest(output);
    }
}

/// How a push sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushSequence {
    /// There were no images to push
    NothingToPush,
    /// Every push succeeded
    Completed,
}

/// Outcome of a successful docker-push run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    NothingToPush,
    Pushed {
        image_name: String,
        digest: String,
        output_path: PathBuf,
    },
}

/// Registry-qualified names to push `repository` as
///
/// With an endpoint the endpoint's registry is used; otherwise every registry
/// the agent is logged in to.
pub fn resolve_image_names(
    connection: &ContainerConnection,
    repository: &str,
    use_endpoint: bool,
) -> Vec<String> {
    if use_endpoint {
        connection
            .qualified_image_name(repository)
            .into_iter()
            .collect()
    } else {
        connection.qualified_image_names_from_config(repository)
    }
}

/// References to push, image-major and tag-minor
pub fn push_targets(images: &[String], tags: &[String]) -> Vec<String> {
    if tags.is_empty() {
        return images.to_vec();
    }

    images
        .iter()
        .flat_map(|image| tags.iter().map(move |tag| format!("{}:{}", image, tag)))
        .collect()
}

/// Pushes every target in order, waiting for each push before the next
///
/// `on_pushed` receives the pushed reference and its output after each push.
/// The first failure stops the sequence.
pub async fn push_multiple_images<F>(
    engine: &dyn ContainerEngine,
    images: &[String],
    tags: &[String],
    arguments: &[String],
    mut on_pushed: F,
) -> Result<PushSequence>
where
    F: FnMut(&str, &str),
{
    if images.is_empty() {
        return Ok(PushSequence::NothingToPush);
    }

    for target in push_targets(images, tags) {
        let output = engine.push(&target, arguments).await?;
        on_pushed(&target, &output);
    }

    Ok(PushSequence::Completed)
}

/// Digest (without `sha256:`) of the first match in `output`, or empty
pub fn extract_digest(output: &str) -> String {
    DIGEST
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Publishes the details of the pushed image
///
/// Reading the Dockerfile is the only fatal step. A failed layer query
/// publishes without layers; a failed request is logged and absorbed.
///
/// # Returns
/// The API response body, or `None` when publishing failed
#[allow(clippy::too_many_arguments)]
pub async fn publish_image_metadata(
    host: &dyn TaskHost,
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    client: &DeploymentClient,
    image_name: &str,
    tags: &[String],
    digest: &str,
    docker_file: &Path,
) -> Result<Option<String>> {
    let image_uri = resource_name(image_name, digest);

    let dockerfile = tokio::fs::read_to_string(docker_file)
        .await
        .map_err(|e| TaskError::io("Failed to read", docker_file, e))?;
    let base_image = base_image_name(&dockerfile);

    let layer_info = match engine.layers(&image_uri).await {
        Ok(layers) => layers,
        Err(e) => {
            host.debug(&format!("Unable to read layers of {}: {}", image_uri, e));
            Vec::new()
        }
    };

    let details = ImageDetails {
        image_name: image_uri.clone(),
        image_uri,
        hash: digest.to_string(),
        base_image_name: base_image,
        distance: 0,
        image_type: String::new(),
        media_type: String::new(),
        tags: tags.to_vec(),
        layer_info,
        build_id: ctx.build_id,
        build_version: ctx.build_number.clone(),
        build_definition_name: ctx.definition_name.clone(),
        build_definition_id: ctx.definition_id.clone(),
    };

    match client.publish_image_details(&details).await {
        Ok(response) => Ok(Some(response)),
        Err(e) => {
            host.debug(&format!(
                "Unable to push to Image Details Artifact Store, Error: {}",
                e
            ));
            Ok(None)
        }
    }
}

/// Runs the push with the given collaborators
pub async fn run(
    host: &dyn TaskHost,
    inputs: &DockerPushInputs,
    ctx: &BuildContext,
    connection: &ContainerConnection,
    engine: &dyn ContainerEngine,
    client: &DeploymentClient,
) -> Result<PushOutcome> {
    let images = resolve_image_names(
        connection,
        &inputs.repository,
        inputs.container_registry.is_some(),
    );

    let docker_file = find_docker_file(host, &inputs.docker_file)
        .filter(|path| host.exists(path))
        .ok_or_else(|| TaskError::DockerfileNotFound(inputs.docker_file.clone()))?;

    let mut pushed = PushResult::default();
    let sequence = push_multiple_images(
        engine,
        &images,
        &inputs.tags,
        &inputs.arguments,
        |image, output| {
            host.info(output.trim_end());
            pushed.record(image, output);
        },
    )
    .await?;

    if sequence == PushSequence::NothingToPush {
        host.debug("Not pushing: no login found for any container registry");
        return Ok(PushOutcome::NothingToPush);
    }

    info!(
        "Pushed {} with digest '{}'",
        pushed.image_name, pushed.digest
    );
    if pushed.digest.is_empty() {
        host.warning(&format!("No image digest in the push output of {}", pushed.image_name));
    }

    if let Some(response) = publish_image_metadata(
        host,
        ctx,
        engine,
        client,
        &pushed.image_name,
        &inputs.tags,
        &pushed.digest,
        &docker_file,
    )
    .await?
    {
        host.info(&format!("Image details API response: {}", response));
    }

    let output_path = write_task_output(&ctx.temp_directory, "push", &pushed.output)?;
    host.set_variable(OUTPUT_VARIABLE, &output_path.display().to_string());

    Ok(PushOutcome::Pushed {
        image_name: pushed.image_name,
        digest: pushed.digest,
        output_path,
    })
}

/// Entry point of the docker-push task
pub async fn execute(host: &dyn TaskHost) -> TaskResult {
    let result = async {
        let ctx = BuildContext::from_host(host);
        let inputs = DockerPushInputs::from_host(host)?;

        let mut connection =
            ContainerConnection::from_host(host, inputs.container_registry.as_deref())?;
        connection.open(&ctx.temp_directory)?;
        let engine = DockerCli::locate(host, &connection)?;

        let mut client = DeploymentClient::new(ctx.project_url());
        if let Some(token) = &ctx.access_token {
            client = client.with_access_token(token.clone());
        }
        debug!("Image details endpoint: {}", client.image_details_url());

        let outcome = run(host, &inputs, &ctx, &connection, &engine, &client).await;
        connection.close();

        Ok::<_, TaskError>(match outcome? {
            PushOutcome::NothingToPush => TaskResult::succeeded("Nothing to push"),
            PushOutcome::Pushed {
                image_name,
                output_path,
                ..
            } => TaskResult::succeeded(format!("Pushed {}", image_name))
                .with_output_path(output_path.display().to_string()),
        })
    }
    .await;

    finish(host, result)
}
