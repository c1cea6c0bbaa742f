//! Structural parsing of front matter lines.
//!
//! The YAML node kind decides each value's variant up front, so nothing
//! downstream inspects dynamically typed data. Failures carry the line that
//! caused them and a category the repairer knows how to act on; categories
//! are derived from the shape of the offending lines, not from parser
//! diagnostics.

use crate::core::locator::MetadataLines;
use crate::core::schema::{self, MetadataValue, Shape};
use regex::Regex;
use serde::Serialize;
use serde_yaml::Value as YamlValue;
use std::fmt;
use std::sync::LazyLock;

/// A key at column zero.
static TOP_LEVEL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_-]*):").unwrap());

/// An indented `word:` prefix, optionally behind a list marker.
static NESTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(?:-\s+)?[A-Za-z][A-Za-z0-9_-]*:(?:\s|$)").unwrap());

/// Splits a line into its structural prefix (`- ` or `key: `) and value.
static VALUE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*(?:-\s+|[A-Za-z][A-Za-z0-9_-]*:\s+))(.*)$").unwrap()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    /// A mapping appears where a list item or string was expected.
    NestedMapInList,
    /// Raw bracketed text was read as a flow sequence.
    RawBracket,
    /// A plain scalar starts with `@`, which cannot start a YAML token.
    BareAt,
    /// The block is empty or is not a mapping.
    NotAMap,
    Unrecognized,
}

impl FailureCategory {
    /// Categories the repairer has a transform for.
    pub fn is_repairable(self) -> bool {
        matches!(
            self,
            FailureCategory::NestedMapInList | FailureCategory::RawBracket | FailureCategory::BareAt
        )
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureCategory::NestedMapInList => "nested-map-in-list",
            FailureCategory::RawBracket => "raw-bracket",
            FailureCategory::BareAt => "bare-at",
            FailureCategory::NotAMap => "not-a-map",
            FailureCategory::Unrecognized => "unrecognized",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// One-based line within the metadata block, when known.
    pub line: Option<usize>,
    pub category: FailureCategory,
    pub message: String,
}

/// Parsed key/value pairs in source order, keys as written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub entries: Vec<(String, MetadataValue)>,
}

impl RawMetadata {
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type ParseOutcome = Result<RawMetadata, ParseFailure>;

/// Parse the whole block; any defect fails the parse.
pub fn parse(lines: &MetadataLines) -> ParseOutcome {
    let text = lines.to_text();
    if text.trim().is_empty() {
        return Err(ParseFailure {
            line: None,
            category: FailureCategory::NotAMap,
            message: "metadata block is empty".to_string(),
        });
    }
    let value: YamlValue = serde_yaml::from_str(&text).map_err(|e| {
        let line = e.location().map(|l| l.line());
        ParseFailure {
            line,
            category: classify(lines, line),
            message: e.to_string(),
        }
    })?;
    match value {
        YamlValue::Mapping(mapping) => convert_mapping(mapping, lines),
        _ => Err(ParseFailure {
            line: None,
            category: FailureCategory::NotAMap,
            message: "metadata block is not a key/value mapping".to_string(),
        }),
    }
}

/// Parse each top-level key on its own and keep whatever succeeds.
///
/// Returns the extracted metadata together with the failures of the chunks
/// that were dropped. Fails only if no chunk yields a single key.
pub fn parse_best_effort(
    lines: &MetadataLines,
) -> Result<(RawMetadata, Vec<ParseFailure>), ParseFailure> {
    let mut metadata = RawMetadata::default();
    let mut dropped = Vec::new();

    for (start, end) in top_level_chunks(lines) {
        let chunk = MetadataLines::new(lines[start..=end].to_vec());
        let parsed = serde_yaml::from_str::<YamlValue>(&chunk.to_text())
            .map_err(|e| ParseFailure {
                line: e.location().map(|l| l.line() + start),
                category: classify(&chunk, e.location().map(|l| l.line())),
                message: e.to_string(),
            })
            .and_then(|value| match value {
                YamlValue::Mapping(mapping) => convert_mapping(mapping, lines),
                _ => Err(ParseFailure {
                    line: Some(start + 1),
                    category: FailureCategory::NotAMap,
                    message: "chunk is not a key/value mapping".to_string(),
                }),
            });
        match parsed {
            Ok(chunk_metadata) => metadata.entries.extend(chunk_metadata.entries),
            Err(failure) => dropped.push(failure),
        }
    }

    if metadata.is_empty() {
        return Err(dropped.into_iter().next().unwrap_or(ParseFailure {
            line: None,
            category: FailureCategory::NotAMap,
            message: "no key could be parsed from the metadata block".to_string(),
        }));
    }
    Ok((metadata, dropped))
}

/// Zero-based indices of lines showing the given defect.
pub fn defect_lines(category: FailureCategory, lines: &MetadataLines) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| match category {
            FailureCategory::NestedMapInList => NESTED_KEY.is_match(line),
            FailureCategory::RawBracket => is_raw_bracket(line),
            FailureCategory::BareAt => split_value(line).is_some_and(|(_, v)| v.starts_with('@')),
            FailureCategory::NotAMap | FailureCategory::Unrecognized => false,
        })
        .map(|(i, _)| i)
        .collect()
}

/// `(prefix, value)` of a list item or `key: value` line.
pub(crate) fn split_value(line: &str) -> Option<(&str, &str)> {
    let caps = VALUE_START.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// The key opened by a column-zero line.
pub(crate) fn top_level_key(line: &str) -> Option<&str> {
    TOP_LEVEL_KEY
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn is_raw_bracket(line: &str) -> bool {
    let Some((prefix, value)) = split_value(line) else {
        return false;
    };
    if !value.starts_with('[') {
        return false;
    }
    if prefix.trim_start().starts_with('-') {
        return true;
    }
    let key = prefix.trim().trim_end_matches(':').to_lowercase();
    match schema::shape_of(&key) {
        Some(Shape::List) => !value.trim_end().ends_with(']'),
        _ => true,
    }
}

/// Pick the category whose defect lines sit at or next to `line`, falling
/// back to the first category with any defect at all.
fn classify(lines: &MetadataLines, line: Option<usize>) -> FailureCategory {
    const ORDER: [FailureCategory; 3] = [
        FailureCategory::RawBracket,
        FailureCategory::BareAt,
        FailureCategory::NestedMapInList,
    ];
    let found: Vec<(FailureCategory, Vec<usize>)> = ORDER
        .iter()
        .map(|&c| (c, defect_lines(c, lines)))
        .filter(|(_, hits)| !hits.is_empty())
        .collect();

    if let Some(line) = line {
        let at = line.saturating_sub(1);
        if let Some((category, _)) = found
            .iter()
            .find(|(_, hits)| hits.iter().any(|&i| i + 1 >= at && i <= at + 1))
        {
            return *category;
        }
    }
    found
        .first()
        .map(|(c, _)| *c)
        .unwrap_or(FailureCategory::Unrecognized)
}

fn top_level_chunks(lines: &MetadataLines) -> Vec<(usize, usize)> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| TOP_LEVEL_KEY.is_match(line))
        .map(|(i, _)| i)
        .collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).map(|next| next - 1).unwrap_or(lines.len() - 1);
            (start, end)
        })
        .collect()
}

fn convert_mapping(mapping: serde_yaml::Mapping, lines: &MetadataLines) -> ParseOutcome {
    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Some(key) = scalar_text(&key) else {
            tracing::warn!("ignoring non-scalar metadata key");
            continue;
        };
        let value = convert_value(&key, value, lines)?;
        entries.push((key, value));
    }
    Ok(RawMetadata { entries })
}

fn convert_value(key: &str, value: YamlValue, lines: &MetadataLines) -> Result<MetadataValue, ParseFailure> {
    match value {
        YamlValue::Null | YamlValue::Number(_) | YamlValue::Bool(_) => Ok(MetadataValue::Absent),
        YamlValue::String(s) => Ok(MetadataValue::Scalar(s)),
        YamlValue::Tagged(tagged) => convert_value(key, tagged.value, lines),
        YamlValue::Mapping(_) => Err(located_failure(
            key,
            lines,
            FailureCategory::NestedMapInList,
            "a mapping was found where a value was expected",
        )),
        YamlValue::Sequence(items) => {
            let shape = schema::shape_of(&key.to_lowercase());
            if matches!(shape, Some(Shape::Scalar | Shape::Date)) && is_flow_sequence(key, lines) {
                return Err(located_failure(
                    key,
                    lines,
                    FailureCategory::RawBracket,
                    "bracketed text was read as a list",
                ));
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    YamlValue::Mapping(_) => {
                        return Err(located_failure(
                            key,
                            lines,
                            FailureCategory::NestedMapInList,
                            "a mapping was found where a list item was expected",
                        ));
                    }
                    YamlValue::Sequence(_) => {
                        return Err(located_failure(
                            key,
                            lines,
                            FailureCategory::RawBracket,
                            "bracketed text was read as a nested list",
                        ));
                    }
                    other => {
                        if let Some(text) = scalar_text(&other) {
                            out.push(text);
                        }
                    }
                }
            }
            Ok(MetadataValue::List(out))
        }
    }
}

fn scalar_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Tagged(tagged) => scalar_text(&tagged.value),
        YamlValue::Null | YamlValue::Sequence(_) | YamlValue::Mapping(_) => None,
    }
}

fn is_flow_sequence(key: &str, lines: &MetadataLines) -> bool {
    lines
        .field(key)
        .and_then(|(start, _)| split_value(&lines[start]))
        .is_some_and(|(_, value)| value.starts_with('['))
}

fn located_failure(
    key: &str,
    lines: &MetadataLines,
    category: FailureCategory,
    message: &str,
) -> ParseFailure {
    let line = lines.field(key).map(|(start, end)| {
        defect_lines(category, lines)
            .into_iter()
            .find(|i| (start..=end).contains(i))
            .unwrap_or(start)
            + 1
    });
    ParseFailure {
        line,
        category,
        message: format!("{}: {}", key, message),
    }
}
