//! Where the application manifest comes from.

use std::path::Path;

use async_trait::async_trait;
use flotilla_core::{AppManifest, ConfigError, GitSource};
use tokio::process::Command;
use tracing::{debug, info};

/// Fetches the manifest of an application at a branch.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch(&self, source: &GitSource, branch: &str) -> Result<AppManifest, ConfigError>;
}

/// Clones the repository into a temporary directory and reads the manifest.
///
/// The checkout is removed when the fetch returns, whatever the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitManifestSource;

#[async_trait]
impl ManifestSource for GitManifestSource {
    async fn fetch(&self, source: &GitSource, branch: &str) -> Result<AppManifest, ConfigError> {
        let workspace = tempfile::Builder::new()
            .prefix("flotilla-manifest")
            .tempdir()
            .map_err(|e| git_error("workspace", source, e.to_string()))?;
        let checkout = workspace.path().join(&source.name);
        info!(url = %source.url, %branch, "fetching manifest");

        let mut clone = Command::new("git");
        clone.args(["clone", "--quiet", &source.url]).arg(&checkout);
        run_git(clone, "clone", source).await?;

        let mut switch = Command::new("git");
        switch
            .arg("-C")
            .arg(&checkout)
            .args(["checkout", "--quiet", branch]);
        run_git(switch, "checkout", source).await?;

        let manifest = AppManifest::from_checkout(&checkout, &source.url)?;
        debug!(
            bootstrap = manifest.bootstrap.len(),
            launch = manifest.launch.len(),
            env = manifest.env.len(),
            "manifest parsed"
        );
        Ok(manifest)
    }
}

async fn run_git(mut command: Command, operation: &'static str, source: &GitSource) -> Result<(), ConfigError> {
    let output = command
        .output()
        .await
        .map_err(|e| git_error(operation, source, e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(git_error(operation, source, stderr.trim().to_string()));
    }
    Ok(())
}

fn git_error(operation: &'static str, source: &GitSource, reason: String) -> ConfigError {
    ConfigError::Git {
        operation,
        url: source.url.clone(),
        reason,
    }
}

/// A manifest known up front.
#[derive(Debug, Clone)]
pub struct StaticManifest(pub AppManifest);

#[async_trait]
impl ManifestSource for StaticManifest {
    async fn fetch(&self, _source: &GitSource, _branch: &str) -> Result<AppManifest, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Reads the manifest from a local checkout.
#[derive(Debug, Clone)]
pub struct LocalManifest {
    pub root: std::path::PathBuf,
}

impl LocalManifest {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ManifestSource for LocalManifest {
    async fn fetch(&self, source: &GitSource, _branch: &str) -> Result<AppManifest, ConfigError> {
        AppManifest::from_checkout(&self.root, &source.url)
    }
}

#[cfg(test)]
mod tests {
    use flotilla_core::manifest::MANIFEST_FILE;

    use super::*;

    fn source() -> GitSource {
        GitSource::parse("https://example.com/app.git").unwrap()
    }

    #[tokio::test]
    async fn local_manifest_reads_checkout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "bootstrap = [\"make\"]\nlaunch = [\"./run\"]\n",
        )
        .unwrap();

        let manifest = LocalManifest::new(dir.path())
            .fetch(&source(), "master")
            .await
            .unwrap();
        assert_eq!(manifest.bootstrap, vec!["make"]);
        assert_eq!(manifest.launch, vec!["./run"]);
    }

    #[tokio::test]
    async fn local_manifest_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalManifest::new(dir.path())
            .fetch(&source(), "master")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingManifest { .. }));
    }

    #[tokio::test]
    async fn static_manifest_is_returned_as_is() {
        let manifest = AppManifest::parse("launch = [\"./run\"]").unwrap();
        let fetched = StaticManifest(manifest.clone())
            .fetch(&source(), "dev")
            .await
            .unwrap();
        assert_eq!(fetched, manifest);
    }

    #[tokio::test]
    async fn clone_of_missing_repository_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/missing.git", dir.path().display());
        let err = GitManifestSource
            .fetch(&GitSource::parse(&url).unwrap(), "master")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Git { .. }));
    }
}
