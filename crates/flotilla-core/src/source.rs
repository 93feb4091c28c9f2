//! Deploy input parsing: application repository URL and env override string.

use crate::error::ConfigError;

/// A git repository holding a deployable application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    /// Repository name without the `.git` suffix, e.g. `app`.
    pub name: String,
}

impl GitSource {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        let stem = url
            .strip_suffix(".git")
            .ok_or_else(|| ConfigError::InvalidGitUrl(url.to_string()))?;
        let name = stem
            .rsplit(['/', ':'])
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ConfigError::InvalidGitUrl(url.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            name: name.to_string(),
        })
    }
}

/// Whether `name` can be exported by a POSIX shell: a letter or underscore
/// followed by letters, digits and underscores.
pub fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Extra environment variables given as `VAR1=VAL1,VAR2=VAL2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides(Vec<(String, String)>);

impl EnvOverrides {
    /// Parse an override string. The empty string yields no overrides.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut vars = Vec::new();
        for pair in s.split(',') {
            let parts: Vec<&str> = pair.split('=').collect();
            match parts.as_slice() {
                [key, value] if !key.trim().is_empty() => {
                    let key = key.trim();
                    if !is_env_name(key) {
                        return Err(ConfigError::InvalidEnvName(key.to_string()));
                    }
                    vars.push((key.to_string(), value.to_string()));
                }
                _ => return Err(ConfigError::MalformedOverride(s.to_string())),
            }
        }
        Ok(Self(vars))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
