//! kepfix: repairs and canonicalizes proposal front matter.
//!
//! Each proposal document carries a YAML header between two `---` lines.
//! kepfix parses it, repairs the handful of malformations hand-edited
//! headers tend to have, coerces every field to the proposal schema, fills
//! missing required fields (dates come from git history) and writes the
//! header back in canonical field order. The body is never touched.
//!
//! # Pipeline
//!
//! 1. [`core::document`] splits preamble, metadata lines and body.
//! 2. [`core::repair`] parses and repairs the metadata lines.
//! 3. [`core::reconcile`] coerces, backfills and serializes.
//! 4. [`core::fix`] writes the result when it differs from the input.
//!
//! ```bash
//! kepfix --dry-run keps/sig-*/*.md
//! kepfix --repo-root ~/src/enhancements keps/sig-node/0001-example.md
//! ```

pub mod cli;
pub mod core;

use crate::cli::{Cli, OutputFormat};
use crate::core::config::{Config, REPO_ROOT_ENV};
use crate::core::fix::{self, FixOptions};
use crate::core::history::GitHistory;
use crate::core::output;
use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Parse the command line, fix every file and print the report.
///
/// Exit code 0 when no file failed, 1 otherwise. Usage and configuration
/// errors are returned to the caller.
pub fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::try_parse_from(cli::normalize_args(std::env::args_os()))
        .unwrap_or_else(|e| e.exit());
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::load(cli.config.as_deref(), &cwd)?
        .with_env_override(std::env::var(REPO_ROOT_ENV).ok())
        .with_repo_root(cli.repo_root.clone());
    config.validate()?;
    tracing::debug!(?config, "resolved config");

    let history = GitHistory::new(&config.repo_root, &config.git_binary);
    let options = FixOptions {
        dry_run: cli.dry_run,
        max_repair_passes: config.max_repair_passes,
    };
    let batch = fix::run_batch(&cli.files, &history, &options);

    match cli.format {
        OutputFormat::Text => {
            if !std::io::IsTerminal::is_terminal(&std::io::stdout()) {
                colored::control::set_override(false);
            }
            println!("{}", output::render_text(&batch, cli.dry_run, cli.verbose));
        }
        OutputFormat::Json => {
            println!(
                "{}",
                output::render_json(&batch).context("failed to serialize report")?
            );
        }
    }

    Ok(if batch.any_failed() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Logs go to stderr; stdout carries the report. `RUST_LOG` wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "kepfix=debug" } else { "kepfix=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .try_init();
}
