//! The per-file fix pipeline and the batch driver.
//!
//! split -> repair -> reconcile -> validate -> write. Every file gets its own
//! outcome; a failure in one never stops the rest of the batch.

use crate::core::document::{self, Document};
use crate::core::error::KepfixError;
use crate::core::history::History;
use crate::core::reconcile::Reconciler;
use crate::core::repair::{DEFAULT_MAX_PASSES, RepairAction, Repairer};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug)]
pub struct FixOptions {
    /// Run the whole pipeline but never write.
    pub dry_run: bool,
    pub max_repair_passes: usize,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_repair_passes: DEFAULT_MAX_PASSES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    /// The canonical document differs from the input.
    Fixed,
    Unchanged,
    /// No front matter delimited the usual way.
    Skipped,
    Failed,
}

impl fmt::Display for FixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FixStatus::Fixed => "fixed",
            FixStatus::Unchanged => "unchanged",
            FixStatus::Skipped => "skipped",
            FixStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FixStatus,
    pub written: bool,
    pub repairs: Vec<RepairAction>,
    /// True when repairs did not yield a clean parse and only some keys were
    /// recovered.
    pub partial: bool,
    pub backfilled: Vec<String>,
    pub dropped_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn new(path: &Path, status: FixStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            written: false,
            repairs: Vec::new(),
            partial: false,
            backfilled: Vec::new(),
            dropped_keys: Vec::new(),
            error: None,
        }
    }

    fn failed(path: &Path, err: &KepfixError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::new(path, FixStatus::Failed)
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub fixed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn push(&mut self, report: FileReport) {
        match report.status {
            FixStatus::Fixed => self.fixed += 1,
            FixStatus::Unchanged => self.unchanged += 1,
            FixStatus::Skipped => self.skipped += 1,
            FixStatus::Failed => self.failed += 1,
        }
        self.files.push(report);
    }

    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| f.error.clone())
            .collect()
    }
}

/// Result of running the pipeline over one document's text.
#[derive(Debug)]
pub enum FixOutcome {
    Skipped,
    Rendered {
        document: Document,
        text: String,
        report: FileReport,
    },
}

/// Run the pipeline over `text` without touching the filesystem.
pub fn fix_text(
    path: &Path,
    text: &str,
    history: &dyn History,
    options: &FixOptions,
) -> Result<FixOutcome, KepfixError> {
    let Some(mut document) = document::split(path, text) else {
        return Ok(FixOutcome::Skipped);
    };

    let repaired = Repairer::new(options.max_repair_passes).repair(&mut document)?;
    let source = document.metadata.clone();
    let reconciled =
        Reconciler::new(history).reconcile(repaired.metadata, &source, path)?;
    reconciled.validate()?;

    document.metadata = reconciled.to_lines(&source.to_text());
    document.canonicalize_delimiters();
    let rendered = document.render();

    let status = if rendered == text {
        FixStatus::Unchanged
    } else {
        FixStatus::Fixed
    };
    let report = FileReport {
        repairs: repaired.report.actions,
        partial: !repaired.report.clean,
        backfilled: reconciled.backfilled.iter().map(|k| k.to_string()).collect(),
        dropped_keys: reconciled.dropped_keys,
        ..FileReport::new(path, status)
    };
    Ok(FixOutcome::Rendered {
        document,
        text: rendered,
        report,
    })
}

/// Fix one file in place. Errors are returned, not reported.
pub fn fix_file(
    path: &Path,
    history: &dyn History,
    options: &FixOptions,
) -> Result<FileReport, KepfixError> {
    let text = fs::read_to_string(path).map_err(KepfixError::IoError)?;
    match fix_text(path, &text, history, options)? {
        FixOutcome::Skipped => Ok(FileReport::new(path, FixStatus::Skipped)),
        FixOutcome::Rendered {
            document,
            mut report,
            ..
        } => {
            if report.status == FixStatus::Fixed && !options.dry_run {
                document.write()?;
                report.written = true;
            }
            Ok(report)
        }
    }
}

/// Fix every path in order, isolating failures per file.
pub fn run_batch(paths: &[PathBuf], history: &dyn History, options: &FixOptions) -> BatchReport {
    let mut batch = BatchReport::default();
    for path in paths {
        let report = match fix_file(path, history, options) {
            Ok(report) => {
                tracing::info!(
                    path = %path.display(),
                    status = %report.status,
                    repairs = report.repairs.len(),
                    written = report.written,
                    "processed"
                );
                report
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "fix failed");
                FileReport::failed(path, &err)
            }
        };
        batch.push(report);
    }
    batch
}
