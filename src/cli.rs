//! CLI struct definitions for the kepfix command-line interface.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "kepfix",
    version = env!("CARGO_PKG_VERSION"),
    about = "Repair and canonicalize the YAML front matter of proposal documents, filling missing dates from git history."
)]
pub(crate) struct Cli {
    /// Run every step, including history queries, but do not write any file.
    #[clap(long)]
    pub dry_run: bool,
    /// Repository that history queries run in (overrides config and KEPFIX_REPO_ROOT).
    #[clap(long)]
    pub repo_root: Option<PathBuf>,
    /// Config file; defaults to ./kepfix.toml when present.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Log debug detail to stderr and list every repair.
    #[clap(long, short = 'v')]
    pub verbose: bool,
    /// Proposal files, processed in order.
    #[clap(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Accept the single-dash `-dry-run` spelling alongside `--dry-run`.
pub(crate) fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut options_done = false;
    args.into_iter()
        .map(|arg| {
            if options_done {
                return arg;
            }
            match arg.to_str() {
                Some("--") => {
                    options_done = true;
                    arg
                }
                Some("-dry-run") => OsString::from("--dry-run"),
                _ => arg,
            }
        })
        .collect()
}
