//! Version-control dates for a proposal file.
//!
//! The reconciler only falls back to history when the front matter carries
//! no usable date. `History` keeps the lookup swappable; `GitHistory` shells
//! out to `git log` in the configured repository.

use crate::core::error::KepfixError;
use chrono::{DateTime, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait History {
    /// Date of the oldest commit that added `path`, following renames.
    fn first_added(&self, path: &Path) -> Result<NaiveDate, KepfixError>;

    /// Date of the most recent commit touching `path`.
    fn last_touched(&self, path: &Path) -> Result<NaiveDate, KepfixError>;
}

#[derive(Debug, Clone)]
pub struct GitHistory {
    repo_root: PathBuf,
    git_binary: String,
}

impl GitHistory {
    pub fn new(repo_root: impl Into<PathBuf>, git_binary: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            git_binary: git_binary.into(),
        }
    }

    fn log(&self, path: &Path, args: &[&str]) -> Result<String, KepfixError> {
        let target = resolve(path);
        tracing::debug!(
            repo = %self.repo_root.display(),
            path = %target.display(),
            ?args,
            "querying history"
        );
        let output = Command::new(&self.git_binary)
            .current_dir(&self.repo_root)
            .arg("log")
            .args(args)
            .arg("--")
            .arg(&target)
            .output()
            .map_err(|e| KepfixError::VcsQueryError {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {}", self.git_binary, e),
            })?;
        if !output.status.success() {
            return Err(KepfixError::VcsQueryError {
                path: path.to_path_buf(),
                message: format!(
                    "git log exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl History for GitHistory {
    fn first_added(&self, path: &Path) -> Result<NaiveDate, KepfixError> {
        let out = self.log(path, &["--follow", "--diff-filter=A", "--format=%aI"])?;
        let oldest = out.lines().map(str::trim).rfind(|l| !l.is_empty());
        parse_timestamp(path, oldest.unwrap_or(""))
    }

    fn last_touched(&self, path: &Path) -> Result<NaiveDate, KepfixError> {
        let out = self.log(path, &["-1", "--format=%aI"])?;
        let newest = out.lines().map(str::trim).find(|l| !l.is_empty());
        parse_timestamp(path, newest.unwrap_or(""))
    }
}

/// Reduce a strict ISO-8601 timestamp to its calendar date in the
/// timestamp's own offset.
pub fn parse_timestamp(path: &Path, raw: &str) -> Result<NaiveDate, KepfixError> {
    let raw = raw.trim().trim_matches('"');
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.date_naive())
        .map_err(|e| KepfixError::VcsQueryError {
            path: path.to_path_buf(),
            message: format!("unparsable timestamp {:?}: {}", raw, e),
        })
}

/// Absolute form of `path`, so git resolves it no matter where it runs.
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
