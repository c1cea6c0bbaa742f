//! Runtime configuration.
//!
//! Defaults, then an optional `kepfix.toml`, then `KEPFIX_REPO_ROOT`, then
//! command-line flags. Later sources win.

use crate::core::error::KepfixError;
use crate::core::repair::DEFAULT_MAX_PASSES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "kepfix.toml";
pub const REPO_ROOT_ENV: &str = "KEPFIX_REPO_ROOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Working directory for history queries.
    pub repo_root: PathBuf,
    pub git_binary: String,
    /// Upper bound on parse-and-repair passes per file.
    pub max_repair_passes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            git_binary: "git".to_string(),
            max_repair_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl Config {
    /// Load `explicit` if given, else `kepfix.toml` under `cwd` when present.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, KepfixError> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(KepfixError::ConfigError(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => {
                let path = cwd.join(CONFIG_FILE);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        tracing::debug!(path = %path.display(), "loading config");
        let content = fs::read_to_string(&path).map_err(KepfixError::IoError)?;
        Self::from_toml(&content)
            .map_err(|e| KepfixError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, KepfixError> {
        toml::from_str(content).map_err(|e| KepfixError::ConfigError(e.to_string()))
    }

    /// Apply the value of `KEPFIX_REPO_ROOT`, if set and non-empty.
    pub fn with_env_override(mut self, repo_root: Option<String>) -> Self {
        if let Some(root) = repo_root.filter(|r| !r.trim().is_empty()) {
            self.repo_root = PathBuf::from(root);
        }
        self
    }

    pub fn with_repo_root(mut self, repo_root: Option<PathBuf>) -> Self {
        if let Some(root) = repo_root {
            self.repo_root = root;
        }
        self
    }

    pub fn validate(&self) -> Result<(), KepfixError> {
        if self.max_repair_passes == 0 {
            return Err(KepfixError::ConfigError(
                "max_repair_passes must be at least 1".to_string(),
            ));
        }
        if self.git_binary.trim().is_empty() {
            return Err(KepfixError::ConfigError(
                "git_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_default_file_gives_defaults() {
        let tmp = tempdir().unwrap();
        let config = Config::load(None, tmp.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_repair_passes, 8);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = Config::load(Some(&tmp.path().join("nope.toml")), tmp.path()).unwrap_err();
        assert!(matches!(err, KepfixError::ConfigError(_)));
    }

    #[test]
    fn default_file_is_picked_up() {
        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "repo_root = \"/srv/enhancements\"\nmax_repair_passes = 3\n",
        )
        .unwrap();
        let config = Config::load(None, tmp.path()).unwrap();
        assert_eq!(config.repo_root, PathBuf::from("/srv/enhancements"));
        assert_eq!(config.max_repair_passes, 3);
        assert_eq!(config.git_binary, "git");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("colour = true\n").is_err());
    }

    #[test]
    fn later_sources_win() {
        let config = Config::from_toml("repo_root = \"/from/file\"\n")
            .unwrap()
            .with_env_override(Some("/from/env".into()));
        assert_eq!(config.repo_root, PathBuf::from("/from/env"));
        let config = config.with_repo_root(Some(PathBuf::from("/from/flag")));
        assert_eq!(config.repo_root, PathBuf::from("/from/flag"));
        let config = config.with_env_override(Some(" ".into())).with_repo_root(None);
        assert_eq!(config.repo_root, PathBuf::from("/from/flag"));
    }

    #[test]
    fn zero_passes_is_rejected() {
        let config = Config {
            max_repair_passes: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
