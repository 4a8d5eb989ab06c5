//! Image reference and Dockerfile helpers

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::host::TaskHost;

static IMAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([^/]+)/)?(?:([^/]+)/)?([^@:/]+)(?:[@:](.+))?$")
        .expect("image reference pattern is valid")
});

/// Fully qualified URI of an image digest
///
/// Normalises Docker Hub shorthands: `app` becomes `docker.io/library/app`
/// and `user/app` becomes `docker.io/user/app`. Any tag on `image` is dropped.
pub fn resource_name(image: &str, digest: &str) -> String {
    let Some(captures) = IMAGE_REFERENCE.captures(image) else {
        return format!("https://{}@sha256:{}", strip_tag(image), digest);
    };

    let mut registry = captures.get(1).map(|m| m.as_str());
    let mut namespace = captures.get(2).map(|m| m.as_str());
    let repository = &captures[3];

    if namespace.is_none() {
        match registry {
            Some(r) if !r.contains(['.', ':']) && r != "localhost" => {
                namespace = Some(r);
                registry = Some("docker.io");
            }
            None => {
                registry = Some("docker.io");
                namespace = Some("library");
            }
            Some(_) => {}
        }
    }

    let mut uri = String::from("https://");
    for part in [registry, namespace].into_iter().flatten() {
        uri.push_str(part);
        uri.push('/');
    }
    uri.push_str(repository);
    uri.push_str("@sha256:");
    uri.push_str(digest);
    uri
}

/// Removes a `:tag` or `@digest` suffix from an image reference
pub fn strip_tag(image: &str) -> &str {
    if let Some(idx) = image.find('@') {
        return &image[..idx];
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].find(':') {
        Some(idx) => &image[..name_start + idx],
        None => image,
    }
}

/// Image named by the first `FROM` instruction of a Dockerfile
pub fn base_image_name(dockerfile: &str) -> Option<String> {
    dockerfile.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        let instruction = tokens.next()?;
        if !instruction.eq_ignore_ascii_case("FROM") {
            return None;
        }
        tokens.find(|t| !t.starts_with("--")).map(String::from)
    })
}

/// Resolves the `dockerFile` input to a path
///
/// Patterns containing glob characters resolve to their first match.
pub fn find_docker_file(host: &dyn TaskHost, pattern: &str) -> Option<PathBuf> {
    if pattern.contains(['*', '?', '[']) {
        host.find_match(pattern).into_iter().next()
    } else {
        Some(PathBuf::from(pattern))
    }
}
