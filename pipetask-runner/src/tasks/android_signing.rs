//! android-signing task
//!
//! Signs APK files with `jarsigner` and aligns them with `zipalign`.
//! Both tools are resolved before any file is touched, so a missing tool fails
//! the task without leaving half-processed files behind.

use pipetask_core::domain::task::TaskResult;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TaskError};
use crate::host::TaskHost;
use crate::tasks::finish;
use crate::tool::ToolRunner;

/// Task variable holding the downloaded keystore
pub const KEYSTORE_FILE_VARIABLE: &str = "KEYSTORE_FILE_PATH";

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Inputs of the android-signing task
#[derive(Debug, Clone, Default)]
pub struct AndroidSigningInputs {
    /// Pattern of the APK files to process
    pub files: String,
    pub jarsign: bool,
    pub zipalign: bool,
    pub keystore_file: Option<String>,
    pub keystore_alias: Option<String>,
    pub keystore_pass: Option<String>,
    pub key_pass: Option<String>,
    pub jarsigner_arguments: Option<String>,
    /// Explicit zipalign path, overriding SDK discovery
    pub zipalign_location: Option<String>,
}

impl AndroidSigningInputs {
    pub fn from_host(host: &dyn TaskHost) -> Result<Self> {
        Ok(Self {
            files: host.required_input("files")?,
            jarsign: host.bool_input("jarsign"),
            zipalign: host.bool_input("zipalign"),
            keystore_file: host.task_variable(KEYSTORE_FILE_VARIABLE),
            keystore_alias: host.input("keystoreAlias"),
            keystore_pass: host.input("keystorePass"),
            key_pass: host.input("keyPass"),
            jarsigner_arguments: host.input("jarsignerArguments"),
            zipalign_location: host.input("zipalignLocation"),
        })
    }
}

/// Locates jarsigner on PATH, then under `JAVA_HOME`
pub fn resolve_jarsigner(host: &dyn TaskHost) -> Result<PathBuf> {
    if let Some(path) = host.which("jarsigner") {
        return Ok(path);
    }

    let not_found = || {
        TaskError::tool_not_found(
            "jarsigner",
            "Install a JDK and add it to PATH or set JAVA_HOME.",
        )
    };

    let java_home = host.variable("JAVA_HOME").ok_or_else(not_found)?;
    let jarsigner = Path::new(&java_home).join("bin").join(exe("jarsigner"));
    if !host.exists(&jarsigner) {
        return Err(not_found());
    }

    Ok(jarsigner)
}

/// Locates zipalign: explicit location, Android SDK build-tools, then PATH
pub fn resolve_zipalign(host: &dyn TaskHost, location: Option<&str>) -> Result<PathBuf> {
    if let Some(location) = location {
        return Ok(PathBuf::from(location));
    }

    if let Some(android_home) = host.variable("ANDROID_HOME") {
        let pattern = Path::new(&android_home)
            .join("build-tools")
            .join("*")
            .join(exe("zipalign"));
        if let Some(path) = host
            .find_match(&pattern.to_string_lossy())
            .into_iter()
            .next()
        {
            return Ok(path);
        }
        debug!("No zipalign found under {}", android_home);
    }

    host.which("zipalign").ok_or_else(|| {
        TaskError::tool_not_found(
            "zipalign",
            "Set ANDROID_HOME to an SDK with build-tools or set the zipalign location.",
        )
    })
}

/// Moves `file` aside to `{file}{suffix}` and returns the new path
async fn move_aside(file: &Path, suffix: &str) -> Result<PathBuf> {
    let mut moved = file.as_os_str().to_owned();
    moved.push(suffix);
    let moved = PathBuf::from(moved);

    tokio::fs::rename(file, &moved)
        .await
        .map_err(|e| TaskError::io("Failed to move", file, e))?;

    Ok(moved)
}

async fn jarsign(
    host: &dyn TaskHost,
    jarsigner: &Path,
    inputs: &AndroidSigningInputs,
    file: &Path,
) -> Result<()> {
    let keystore = inputs
        .keystore_file
        .as_deref()
        .ok_or_else(|| TaskError::MissingInput(KEYSTORE_FILE_VARIABLE.to_string()))?;
    let alias = inputs
        .keystore_alias
        .as_deref()
        .ok_or_else(|| TaskError::MissingInput("keystoreAlias".to_string()))?;

    let mut runner = ToolRunner::new(jarsigner).arg("-keystore").arg(keystore);
    if let Some(pass) = &inputs.keystore_pass {
        runner = runner.arg("-storepass").secret_arg(pass.clone());
    }
    if let Some(pass) = &inputs.key_pass {
        runner = runner.arg("-keypass").secret_arg(pass.clone());
    }
    if let Some(line) = &inputs.jarsigner_arguments {
        runner = runner.line(line);
    }

    let unsigned = move_aside(file, ".unsigned").await?;
    let output = runner
        .arg("-signedjar")
        .arg(file.to_string_lossy())
        .arg(unsigned.to_string_lossy())
        .arg(alias)
        .exec_checked()
        .await?;

    if !output.stdout.trim().is_empty() {
        host.info(output.stdout.trim_end());
    }
    Ok(())
}

async fn zipalign(host: &dyn TaskHost, zipalign: &Path, file: &Path) -> Result<()> {
    let unaligned = move_aside(file, ".unaligned").await?;
    let output = ToolRunner::new(zipalign)
        .args(["-v", "4"])
        .arg(unaligned.to_string_lossy())
        .arg(file.to_string_lossy())
        .exec_checked()
        .await?;

    if !output.stdout.trim().is_empty() {
        host.info(output.stdout.trim_end());
    }
    Ok(())
}

/// Signs and aligns every matching file
pub async fn run(host: &dyn TaskHost, inputs: &AndroidSigningInputs) -> Result<TaskResult> {
    let files = host.find_match(&inputs.files);
    if files.is_empty() {
        return Err(TaskError::NoMatchingFiles(inputs.files.clone()));
    }

    let jarsigner = if inputs.jarsign {
        Some(resolve_jarsigner(host)?)
    } else {
        None
    };
    let zipaligner = if inputs.zipalign {
        Some(resolve_zipalign(
            host,
            inputs.zipalign_location.as_deref(),
        )?)
    } else {
        None
    };

    for file in &files {
        if let Some(jarsigner) = &jarsigner {
            host.info(&format!("Signing {}", file.display()));
            jarsign(host, jarsigner, inputs, file).await?;
        }
        if let Some(zipaligner) = &zipaligner {
            host.info(&format!("Aligning {}", file.display()));
            zipalign(host, zipaligner, file).await?;
        }
    }

    Ok(TaskResult::succeeded(format!(
        "Processed {} file(s)",
        files.len()
    )))
}

/// Entry point of the android-signing task
pub async fn execute(host: &dyn TaskHost) -> TaskResult {
    let result = async {
        let inputs = AndroidSigningInputs::from_host(host)?;
        run(host, &inputs).await
    }
    .await;

    finish(host, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockTaskHost;

    #[test]
    fn test_resolve_jarsigner_prefers_path() {
        let host = MockTaskHost::new()
            .with_which("jarsigner", "/usr/bin/jarsigner")
            .with_variable("JAVA_HOME", "/opt/jdk");
        assert_eq!(
            resolve_jarsigner(&host).unwrap(),
            PathBuf::from("/usr/bin/jarsigner")
        );
    }

    #[test]
    fn test_resolve_jarsigner_from_java_home() {
        let jarsigner = Path::new("/opt/jdk").join("bin").join(exe("jarsigner"));
        let host = MockTaskHost::new()
            .with_variable("JAVA_HOME", "/opt/jdk")
            .with_exists(jarsigner.clone(), true);
        assert_eq!(resolve_jarsigner(&host).unwrap(), jarsigner);
    }

    #[test]
    fn test_resolve_jarsigner_missing() {
        let host = MockTaskHost::new().with_variable("JAVA_HOME", "");
        let err = resolve_jarsigner(&host).unwrap_err();
        assert!(err.to_string().starts_with("jarsigner not found"));

        let host = MockTaskHost::new()
            .with_variable("JAVA_HOME", "/opt/jdk")
            .with_exists(Path::new("/opt/jdk").join("bin").join(exe("jarsigner")), false);
        assert!(matches!(
            resolve_jarsigner(&host),
            Err(TaskError::ToolNotFound { ref tool, .. }) if tool == "jarsigner"
        ));
    }

    #[test]
    fn test_resolve_zipalign_order() {
        let host = MockTaskHost::new().with_which("zipalign", "/usr/bin/zipalign");
        assert_eq!(
            resolve_zipalign(&host, Some("/tools/zipalign")).unwrap(),
            PathBuf::from("/tools/zipalign")
        );
        assert_eq!(
            resolve_zipalign(&host, None).unwrap(),
            PathBuf::from("/usr/bin/zipalign")
        );

        let pattern = Path::new("/sdk")
            .join("build-tools")
            .join("*")
            .join(exe("zipalign"));
        let host = MockTaskHost::new()
            .with_variable("ANDROID_HOME", "/sdk")
            .with_find_match(
                &pattern.to_string_lossy(),
                vec![PathBuf::from("/sdk/build-tools/34.0.0/zipalign")],
            )
            .with_which("zipalign", "/usr/bin/zipalign");
        assert_eq!(
            resolve_zipalign(&host, None).unwrap(),
            PathBuf::from("/sdk/build-tools/34.0.0/zipalign")
        );
    }

    #[test]
    fn test_resolve_zipalign_missing() {
        let host = MockTaskHost::new();
        let err = resolve_zipalign(&host, None).unwrap_err();
        assert!(err.to_string().starts_with("zipalign not found"));
    }

    #[tokio::test]
    async fn test_no_matching_files() {
        let host = MockTaskHost::new()
            .with_input("files", "/some/path/*.apk")
            .with_find_match("/some/path/*.apk", Vec::new());

        let result = execute(&host).await;
        assert!(!result.is_success());
        assert_eq!(
            host.failure_message().as_deref(),
            Some("No matching files were found with search pattern: /some/path/*.apk")
        );
    }

    #[tokio::test]
    async fn test_missing_files_input() {
        let host = MockTaskHost::new();
        let result = execute(&host).await;
        assert!(!result.is_success());
        assert_eq!(host.failure_message().as_deref(), Some("Input required: files"));
    }
}
