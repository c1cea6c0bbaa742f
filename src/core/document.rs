//! Splitting a proposal into preamble, front matter and body, and writing it
//! back.

use crate::core::error::KepfixError;
use crate::core::locator::MetadataLines;
use std::fs;
use std::path::{Path, PathBuf};

pub const DELIMITER: &str = "---\n";
const FENCE: &str = "```";

/// One proposal document, owned by a single fix operation.
///
/// `opening` and `closing` hold the delimiter lines exactly as read so that
/// an untouched document renders byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub preamble: String,
    pub opening: String,
    pub metadata: MetadataLines,
    pub closing: String,
    pub body: String,
}

enum Section {
    Preamble,
    Metadata,
    Body,
}

/// Split `text` on its first two delimiters.
///
/// The metadata block opens on a line starting with `---` and closes on the
/// next such line, or on a line ending in a code fence. Returns `None` when
/// the text does not carry exactly that structure; the caller skips it.
pub fn split(path: &Path, text: &str) -> Option<Document> {
    let mut delimiters = 0;
    let mut section = Section::Preamble;
    let mut preamble = String::new();
    let mut opening = String::new();
    let mut metadata = Vec::new();
    let mut closing = String::new();
    let mut body = String::new();

    for raw in text.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let is_delimiter = (delimiters < 2 && line.starts_with("---"))
            || (delimiters == 1 && line.trim().ends_with(FENCE));
        if is_delimiter {
            delimiters += 1;
            if delimiters == 1 {
                opening.push_str(raw);
                section = Section::Metadata;
            } else {
                closing.push_str(raw);
                section = Section::Body;
            }
            continue;
        }
        match section {
            Section::Preamble => preamble.push_str(raw),
            Section::Metadata => metadata.push(line.to_string()),
            Section::Body => body.push_str(raw),
        }
    }

    if delimiters != 2 {
        return None;
    }
    Some(Document {
        path: path.to_path_buf(),
        preamble,
        opening,
        metadata: MetadataLines::new(metadata),
        closing,
        body,
    })
}

impl Document {
    /// Replace both delimiters with a plain `---` line.
    ///
    /// A fence that closed the metadata block moves to the head of the body.
    pub fn canonicalize_delimiters(&mut self) {
        if !self.closing.starts_with("---") {
            let mut closing = std::mem::take(&mut self.closing);
            if !closing.ends_with('\n') {
                closing.push('\n');
            }
            let fence = closing.trim_start();
            self.body.insert_str(0, fence);
        }
        self.opening = DELIMITER.to_string();
        self.closing = DELIMITER.to_string();
    }

    pub fn render(&self) -> String {
        let metadata = self.metadata.to_text();
        let mut out = String::with_capacity(
            self.preamble.len()
                + self.opening.len()
                + metadata.len()
                + self.closing.len()
                + self.body.len(),
        );
        out.push_str(&self.preamble);
        out.push_str(&self.opening);
        out.push_str(&metadata);
        out.push_str(&self.closing);
        out.push_str(&self.body);
        out
    }

    pub fn write(&self) -> Result<(), KepfixError> {
        fs::write(&self.path, self.render()).map_err(KepfixError::IoError)
    }
}
