//! Compact rendering of batch results for the terminal.
//!
//! One status line per file, a summary line and a bounded preview of the
//! failures. JSON output carries the full report.

use crate::core::fix::{BatchReport, FileReport, FixStatus};
use colored::Colorize;

/// Single-line form of `input`, cut back to a word boundary once it would
/// pass `max_chars`.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for word in input.split_whitespace() {
        let len = word.chars().count();
        let needed = if out.is_empty() { len } else { len + 1 };
        if used + needed > max_chars {
            if out.is_empty() {
                out.extend(word.chars().take(max_chars));
            }
            out.push_str("...");
            return out;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        used += needed;
    }
    out
}

/// Up to `max_items` messages on one line, with a count of the rest.
pub fn preview_messages<S: AsRef<str>>(messages: &[S], max_items: usize, max_chars: usize) -> String {
    let shown: Vec<String> = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m.as_ref(), max_chars))
        .collect();
    match messages.len().saturating_sub(max_items) {
        0 => shown.join(" | "),
        hidden => format!("{} (+{} more)", shown.join(" | "), hidden),
    }
}

fn status_label(status: FixStatus) -> String {
    let label = status.to_string();
    match status {
        FixStatus::Fixed => label.bright_green().to_string(),
        FixStatus::Unchanged => label.dimmed().to_string(),
        FixStatus::Skipped => label.bright_yellow().to_string(),
        FixStatus::Failed => label.bright_red().bold().to_string(),
    }
}

pub fn file_line(report: &FileReport, dry_run: bool) -> String {
    let mut line = format!(
        "kepfix: {} {}",
        status_label(report.status),
        report.path.display()
    );
    if report.status == FixStatus::Fixed && dry_run {
        line.push_str(" (dry run, not written)");
    }
    if !report.repairs.is_empty() {
        line.push_str(&format!(" repairs={}", report.repairs.len()));
    }
    if report.partial {
        line.push_str(" partial");
    }
    if let Some(error) = &report.error {
        line.push_str(": ");
        line.push_str(&compact_line(error, 160));
    }
    line
}

/// Extra lines shown with `--verbose`.
pub fn detail_lines(report: &FileReport) -> Vec<String> {
    let mut lines = Vec::new();
    for action in &report.repairs {
        lines.push(format!("  repair: line {} {}", action.line, action.category));
    }
    if !report.backfilled.is_empty() {
        lines.push(format!("  backfilled: {}", report.backfilled.join(", ")));
    }
    if !report.dropped_keys.is_empty() {
        lines.push(format!("  dropped: {}", report.dropped_keys.join(", ")));
    }
    lines
}

pub fn render_text(batch: &BatchReport, dry_run: bool, verbose: bool) -> String {
    let mut out = Vec::with_capacity(batch.files.len() + 2);
    for report in &batch.files {
        out.push(file_line(report, dry_run));
        if verbose {
            out.extend(detail_lines(report));
        }
    }
    out.push(format!(
        "kepfix: summary fixed={} unchanged={} skipped={} failed={}",
        batch.fixed, batch.unchanged, batch.skipped, batch.failed
    ));
    let failures = batch.failures();
    if !failures.is_empty() {
        out.push(format!(
            "kepfix: failures {}: {}",
            failures.len(),
            preview_messages(&failures, 2, 110)
        ));
    }
    out.join("\n")
}

pub fn render_json(batch: &BatchReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(batch)
}
