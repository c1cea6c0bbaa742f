//! Heuristic front matter repair.
//!
//! Runs a parse, and on a recognized failure applies the matching textual
//! transform to every line showing that defect, then parses again. The loop
//! is bounded; when it runs out of passes or hits a failure it cannot act on,
//! whatever a per-key parse can still extract is handed on.

use crate::core::document::Document;
use crate::core::error::KepfixError;
use crate::core::locator::MetadataLines;
use crate::core::parse::{
    self, FailureCategory, ParseFailure, RawMetadata, defect_lines, split_value, top_level_key,
};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Key-like prefix of a nested mapping line, keeping indentation and any
/// list marker in group 1.
static KEY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*(?:-\s+)?)[A-Za-z][A-Za-z0-9_-]*:\s*").unwrap()
});

/// Optional dash, then a quoted or unquoted value starting with `@`.
static AT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:-\s+|[A-Za-z][A-Za-z0-9_-]*:\s+)"?@"#).unwrap()
});

pub const DEFAULT_MAX_PASSES: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RepairAction {
    /// One-based line the transform was applied to, numbered before the
    /// transform ran.
    pub line: usize,
    pub category: FailureCategory,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RepairReport {
    /// Lines changed by the unconditional normalization passes.
    pub normalized: usize,
    pub actions: Vec<RepairAction>,
    /// Parse attempts made by the repair loop.
    pub passes: usize,
    /// False when the metadata only parsed key by key.
    pub clean: bool,
    /// Chunks the per-key parse had to leave out.
    pub dropped: Vec<ParseFailure>,
}

#[derive(Debug)]
pub struct Repaired {
    pub metadata: RawMetadata,
    pub report: RepairReport,
}

pub struct Repairer {
    max_passes: usize,
}

impl Default for Repairer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PASSES)
    }
}

impl Repairer {
    pub fn new(max_passes: usize) -> Self {
        Self {
            max_passes: max_passes.max(1),
        }
    }

    /// Repair `document.metadata` in place and return what could be parsed.
    pub fn repair(&self, document: &mut Document) -> Result<Repaired, KepfixError> {
        let mut report = RepairReport {
            normalized: normalize(&mut document.metadata),
            ..RepairReport::default()
        };

        let mut last_failure = None;
        while report.passes < self.max_passes {
            report.passes += 1;
            match parse::parse(&document.metadata) {
                Ok(metadata) => {
                    report.clean = true;
                    return Ok(Repaired { metadata, report });
                }
                Err(failure) => {
                    tracing::debug!(
                        path = %document.path.display(),
                        category = %failure.category,
                        line = ?failure.line,
                        "metadata parse failed"
                    );
                    let category = failure.category;
                    last_failure = Some(failure);
                    if !category.is_repairable() {
                        break;
                    }
                    let applied = apply(category, &mut document.metadata);
                    if applied.is_empty() {
                        break;
                    }
                    report.actions.extend(applied);
                }
            }
        }

        if let Some(failure) = &last_failure {
            tracing::warn!(
                path = %document.path.display(),
                category = %failure.category,
                "giving up on repairs, falling back to per-key parsing"
            );
        }
        match parse::parse_best_effort(&document.metadata) {
            Ok((metadata, dropped)) => {
                report.dropped = dropped;
                Ok(Repaired { metadata, report })
            }
            Err(failure) => {
                let failure = last_failure.unwrap_or(failure);
                Err(KepfixError::ParseFailure {
                    path: document.path.clone(),
                    line: failure.line,
                    category: failure.category,
                    message: failure.message,
                })
            }
        }
    }
}

/// Trim trailing whitespace and quote values starting with `@`.
///
/// Returns the number of lines changed.
pub fn normalize(lines: &mut MetadataLines) -> usize {
    let mut changed = 0;
    for line in lines.iter_mut() {
        let mut fixed = line.trim_end().to_string();
        if AT_VALUE.is_match(&fixed) {
            if !fixed.contains("\"@") {
                fixed = fixed.replacen('@', "\"@", 1);
            }
            if !fixed.ends_with('"') {
                fixed.push('"');
            }
        }
        if fixed != *line {
            *line = fixed;
            changed += 1;
        }
    }
    changed
}

/// Apply the transform for `category` to every line that shows the defect.
pub fn apply(category: FailureCategory, lines: &mut MetadataLines) -> Vec<RepairAction> {
    let targets = defect_lines(category, lines);
    let mut actions = Vec::with_capacity(targets.len());
    // Back to front, so removals do not shift lines still to be visited.
    for &at in targets.iter().rev() {
        match category {
            FailureCategory::NestedMapInList => unnest(lines, at),
            FailureCategory::RawBracket => quote_from(lines, at, '['),
            FailureCategory::BareAt => quote_from(lines, at, '@'),
            FailureCategory::NotAMap | FailureCategory::Unrecognized => continue,
        }
        tracing::debug!(line = at + 1, %category, "applied repair");
        actions.push(RepairAction {
            line: at + 1,
            category,
        });
    }
    actions.reverse();
    actions
}

/// Strip the `word:` prefix; without a list marker the rest continues the
/// previous line.
fn unnest(lines: &mut MetadataLines, at: usize) {
    let cleaned = KEY_PREFIX.replace(&lines[at], "$1").into_owned();
    let is_item = cleaned.trim_start().starts_with("- ");
    if is_item || at == 0 {
        lines[at] = cleaned;
        return;
    }
    let continuation = cleaned.trim();
    if !continuation.is_empty() {
        let previous = &mut lines[at - 1];
        previous.push(' ');
        previous.push_str(continuation);
    }
    lines.remove_line(at);
}

/// Open a double quote before the first `marker` and close it at line end.
fn quote_from(lines: &mut MetadataLines, at: usize, marker: char) {
    let line = lines[at].clone();
    if let (Some(key), Some((_, value))) = (top_level_key(&line), split_value(&line))
        && value.starts_with(marker)
    {
        lines.set_scalar(key, &format!("\"{}\"", value));
        return;
    }
    let mut quoted = line.replacen(marker, &format!("\"{}", marker), 1);
    quoted.push('"');
    lines[at] = quoted;
}
