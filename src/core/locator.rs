//! Metadata lines and the field locator.
//!
//! The front matter is kept as an ordered list of lines so that repairs can
//! be applied surgically, one line at a time, without disturbing unrelated
//! fields.

use regex::Regex;
use std::ops::{Deref, DerefMut};
use std::sync::LazyLock;

/// A line that opens a new key: a lowercase word followed by a colon, after
/// any indentation. List items (`- ...`) never match.
static KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[a-z][a-z0-9_-]*:").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataLines(Vec<String>);

impl MetadataLines {
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    /// Split text on `\n`. A trailing newline does not produce an empty line.
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self(Vec::new());
        }
        let trimmed = text.strip_suffix('\n').unwrap_or(text);
        Self(trimmed.split('\n').map(str::to_string).collect())
    }

    /// Every line followed by `\n`.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.0.iter().map(|l| l.len() + 1).sum());
        for line in &self.0 {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    pub fn insert_line(&mut self, at: usize, line: impl Into<String>) {
        let at = at.min(self.0.len());
        self.0.insert(at, line.into());
    }

    pub fn remove_line(&mut self, at: usize) -> Option<String> {
        (at < self.0.len()).then(|| self.0.remove(at))
    }

    /// Inclusive line range owned by `key`.
    ///
    /// `start == end` means a single-line field. Ownership ends before the
    /// next line that opens another key; trailing blank lines are not owned.
    pub fn field(&self, key: &str) -> Option<(usize, usize)> {
        let marker = format!("{}:", key);
        let start = self
            .0
            .iter()
            .position(|line| line.trim().starts_with(&marker))?;

        let mut end = self.0.len() - 1;
        for (i, line) in self.0.iter().enumerate().skip(start + 1) {
            if KEY_LINE.is_match(line) {
                end = i - 1;
                break;
            }
        }
        while end > start && self.0[end].trim().is_empty() {
            end -= 1;
        }
        Some((start, end))
    }

    /// The owned lines of `key` joined with `\n`.
    pub fn field_text(&self, key: &str) -> Option<String> {
        let (start, end) = self.field(key)?;
        Some(self.0[start..=end].join("\n"))
    }

    /// Rewrite `key` as a single-line `key: value` field.
    ///
    /// A multi-line field collapses into one line at its start; a missing
    /// key is appended.
    pub fn set_scalar(&mut self, key: &str, value: &str) {
        match self.field(key) {
            Some((start, end)) => {
                let line = &self.0[start];
                let indent_len = line.len() - line.trim_start().len();
                let rewritten = format!("{}{}: {}", &line[..indent_len], key, value);
                self.0.splice(start..=end, std::iter::once(rewritten));
            }
            None => {
                let at = self.0.len();
                self.insert_line(at, format!("{}: {}", key, value));
            }
        }
    }
}

impl Deref for MetadataLines {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MetadataLines {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<String>> for MetadataLines {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> MetadataLines {
        MetadataLines::new(raw.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn insert_line_shifts_following_lines() {
        let mut m = lines(&["h", "b", "c"]);
        m.insert_line(1, "BOOM");
        assert_eq!(m.join(" "), "h BOOM b c");
    }

    #[test]
    fn field_ranges() {
        let m = lines(&[
            "test:",
            "  - abd",
            "my-test: hello",
            "deep:",
            "  - hello",
            "  - bye",
        ]);
        assert_eq!(m.field("my-test"), Some((2, 2)));
        assert_eq!(m.field("test"), Some((0, 1)));
        assert_eq!(m.field("deep"), Some((3, 5)));
        assert_eq!(m.field("missing"), None);
    }

    #[test]
    fn field_does_not_match_key_prefixes() {
        let m = lines(&["title-extra: a", "title: b"]);
        assert_eq!(m.field("title"), Some((1, 1)));
    }

    #[test]
    fn field_ignores_colons_inside_list_items() {
        let m = lines(&[
            "see-also:",
            "  - https://example.com/a",
            "  - \"owner: someone\"",
            "status: implementable",
        ]);
        assert_eq!(m.field("see-also"), Some((0, 2)));
    }

    #[test]
    fn field_excludes_trailing_blank_lines() {
        let m = lines(&["title: x", "", "status: y"]);
        assert_eq!(m.field("title"), Some((0, 0)));
    }

    #[test]
    fn every_key_owns_exactly_its_own_lines() {
        let m = lines(&[
            "title: A",
            "authors:",
            "  - \"@a\"",
            "  - \"@b\"",
            "owning-sig: sig-x",
            "reviewers:",
            "  - TBD",
            "status: draft",
        ]);
        let keys = ["title", "authors", "owning-sig", "reviewers", "status"];
        let mut covered = vec![0usize; m.len()];
        for key in keys {
            let (start, end) = m.field(key).unwrap();
            assert!(m[start].starts_with(key));
            for (i, line) in m.iter().enumerate().take(end + 1).skip(start + 1) {
                assert!(!KEY_LINE.is_match(line), "{} leaked into {}", line, key);
                covered[i] += 1;
            }
            covered[start] += 1;
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn set_scalar_rewrites_single_line_field() {
        let mut m = lines(&["title: [abc]", "status: draft"]);
        m.set_scalar("title", "\"[abc]\"");
        assert_eq!(m[0], "title: \"[abc]\"");
        assert_eq!(m[1], "status: draft");
    }

    #[test]
    fn set_scalar_collapses_multi_line_field() {
        let mut m = lines(&["editor:", "  - a", "  - b", "status: draft"]);
        m.set_scalar("editor", "a");
        assert_eq!(m.to_vec(), vec!["editor: a", "status: draft"]);
    }

    #[test]
    fn set_scalar_appends_missing_key() {
        let mut m = lines(&["status: draft"]);
        m.set_scalar("title", "TBD");
        assert_eq!(m.last().map(String::as_str), Some("title: TBD"));
    }

    #[test]
    fn text_round_trip() {
        let m = MetadataLines::from_text("a: 1\nb: 2\n");
        assert_eq!(m.len(), 2);
        assert_eq!(m.to_text(), "a: 1\nb: 2\n");
        assert!(MetadataLines::from_text("").is_empty());
    }
}
