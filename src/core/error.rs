use crate::core::parse::FailureCategory;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KepfixError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("{}: metadata could not be parsed ({category}{}): {message}", .path.display(), line_suffix(.line))]
    ParseFailure {
        path: PathBuf,
        line: Option<usize>,
        category: FailureCategory,
        message: String,
    },
    #[error("field `{key}` cannot be coerced: {reason}")]
    SchemaCoercionFailure { key: String, reason: String },
    #[error("{}: history query failed: {message}", .path.display())]
    VcsQueryError { path: PathBuf, message: String },
    #[error("Config error: {0}")]
    ConfigError(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(", line {}", n),
        None => String::new(),
    }
}
