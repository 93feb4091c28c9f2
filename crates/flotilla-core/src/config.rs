//! `~/.flotilla.toml` user configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{DEFAULT_SSH_PORT, DEFAULT_WORKERS};

/// File name of the user config, relative to the home directory.
pub const CONFIG_FILE: &str = ".flotilla.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlotillaConfig {
    /// Node group targeted by default.
    pub group: Option<String>,
    /// Remote login user. Falls back to the group name.
    pub ssh_user: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub ssh_port: u16,
    pub workers: usize,
    /// Path of the fleet directory file.
    pub directory: Option<PathBuf>,
    /// Application directory on the nodes, relative to the remote home.
    pub app_path: String,
    pub branch: String,
}

impl Default for FlotillaConfig {
    fn default() -> Self {
        Self {
            group: None,
            ssh_user: None,
            ssh_key: None,
            ssh_port: DEFAULT_SSH_PORT,
            workers: DEFAULT_WORKERS,
            directory: None,
            app_path: "app".to_string(),
            branch: "master".to_string(),
        }
    }
}

impl FlotillaConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FlotillaConfig = toml::from_str(content).map_err(|e| {
            ConfigError::InvalidValue {
                field: "config",
                reason: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from `~/.flotilla.toml` when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_path()?;
                if default_path.is_file() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Remote login user for the given group.
    pub fn user_for(&self, group: &str) -> String {
        self.ssh_user.clone().unwrap_or_else(|| group.to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.app_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "app_path",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = FlotillaConfig::parse("").unwrap();
        assert_eq!(config, FlotillaConfig::default());
        assert_eq!(config.ssh_port, 22);
        assert_eq!(config.workers, 10);
        assert_eq!(config.app_path, "app");
    }

    #[test]
    fn parse_full_config() {
        let config = FlotillaConfig::parse(
            r#"
group = "chalmers_slice"
ssh_key = "/home/me/.ssh/id_ed25519"
workers = 4
directory = "/home/me/fleet.toml"
branch = "main"
"#,
        )
        .unwrap();
        assert_eq!(config.group.as_deref(), Some("chalmers_slice"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.branch, "main");
        assert_eq!(config.user_for("chalmers_slice"), "chalmers_slice");
    }

    #[test]
    fn explicit_user_wins_over_group() {
        let config = FlotillaConfig::parse("ssh_user = \"ops\"").unwrap();
        assert_eq!(config.user_for("slice"), "ops");
    }

    #[test]
    fn zero_workers_rejected() {
        let err = FlotillaConfig::parse("workers = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "workers", .. }));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flotilla.toml");
        std::fs::write(&path, "group = \"g\"\n").unwrap();
        let config = FlotillaConfig::load(Some(&path)).unwrap();
        assert_eq!(config.group.as_deref(), Some("g"));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlotillaConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
