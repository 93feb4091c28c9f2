//! `flotilla.toml` application manifest.
//!
//! Lives at the root of the deployed repository and declares how to
//! bootstrap a node and how to launch one instance:
//!
//! ```toml
//! bootstrap = ["make deps", "make build"]
//! launch = ["./bin/server"]
//!
//! [env]
//! RUST_LOG = "info"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::is_env_name;

/// Manifest file name at the repository root.
pub const MANIFEST_FILE: &str = "flotilla.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppManifest {
    #[serde(default)]
    pub bootstrap: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub launch: Vec<String>,
}

impl AppManifest {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let manifest: AppManifest = toml::from_str(content)?;
        if manifest.launch.iter().all(|c| c.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "launch",
                reason: "manifest declares no launch command".to_string(),
            });
        }
        if let Some(key) = manifest.env.keys().find(|k| !is_env_name(k)) {
            return Err(ConfigError::InvalidEnvName(key.clone()));
        }
        Ok(manifest)
    }

    /// Read the manifest from a checked-out repository.
    pub fn from_checkout(root: &Path, url: &str) -> Result<Self, ConfigError> {
        let path = root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(ConfigError::MissingManifest {
                url: url.to_string(),
                file: MANIFEST_FILE.to_string(),
            });
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path, source })?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_sections() {
        let manifest = AppManifest::parse(
            r#"
bootstrap = ["make deps", "make build"]
launch = ["./bin/server --port 8080"]

[env]
RUST_LOG = "info"
MODE = "bench"
"#,
        )
        .unwrap();
        assert_eq!(manifest.bootstrap.len(), 2);
        assert_eq!(manifest.launch, vec!["./bin/server --port 8080"]);
        assert_eq!(manifest.env.get("MODE").map(String::as_str), Some("bench"));
    }

    #[test]
    fn bootstrap_and_env_are_optional() {
        let manifest = AppManifest::parse("launch = [\"./run.sh\"]").unwrap();
        assert!(manifest.bootstrap.is_empty());
        assert!(manifest.env.is_empty());
    }

    #[test]
    fn missing_launch_is_malformed() {
        let err = AppManifest::parse("bootstrap = [\"make\"]").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedManifest(_)));
    }

    #[test]
    fn empty_launch_rejected() {
        let err = AppManifest::parse("launch = []").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "launch", .. }));
    }

    #[test]
    fn env_keys_must_be_shell_names() {
        let err = AppManifest::parse("launch = [\"x\"]\n[env]\n\"A B\" = \"1\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvName(ref k) if k == "A B"));
        let err = AppManifest::parse("launch = [\"x\"]\n[env]\n\"X;touch y\" = \"1\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvName(_)));
    }

    #[test]
    fn unknown_section_rejected() {
        let err = AppManifest::parse("launch = [\"x\"]\nsetup = [\"y\"]").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedManifest(_)));
    }

    #[test]
    fn from_checkout_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppManifest::from_checkout(dir.path(), "https://example.com/app.git").unwrap_err();
        assert!(matches!(err, ConfigError::MissingManifest { .. }));
    }

    #[test]
    fn from_checkout_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "launch = [\"./run.sh\"]\n").unwrap();
        let manifest = AppManifest::from_checkout(dir.path(), "u.git").unwrap();
        assert_eq!(manifest.launch, vec!["./run.sh"]);
    }
}
