//! Schema reconciliation and canonical serialization.
//!
//! Takes whatever the repairer could parse, coerces every known key to its
//! expected shape, fills required keys that are still missing and renders
//! the block in canonical field order.

use crate::core::error::KepfixError;
use crate::core::history::History;
use crate::core::locator::MetadataLines;
use crate::core::parse::RawMetadata;
use crate::core::schema::{
    self, CANONICAL_FIELDS, CREATION_DATE, DATE_FORMAT, FieldSpec, LAST_UPDATED, MetadataValue,
    PLACEHOLDER, Shape,
};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

static EMBEDDED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

/// Alias some proposals use for `editor`.
const EDITORS_ALIAS: &str = "editors";

/// Metadata after reconciliation, one value per canonical key.
#[derive(Clone, Debug, Serialize)]
pub struct Reconciled {
    fields: Vec<(&'static str, MetadataValue)>,
    /// Source keys outside the schema, dropped from the output.
    pub dropped_keys: Vec<String>,
    /// Required keys that had to be filled in.
    pub backfilled: Vec<&'static str>,
}

pub struct Reconciler<'h> {
    history: &'h dyn History,
}

impl<'h> Reconciler<'h> {
    pub fn new(history: &'h dyn History) -> Self {
        Self { history }
    }

    /// `source` is the metadata block the values were parsed from; date
    /// fields that did not parse cleanly are searched there too.
    pub fn reconcile(
        &self,
        parsed: RawMetadata,
        source: &MetadataLines,
        path: &Path,
    ) -> Result<Reconciled, KepfixError> {
        let (mut values, source_keys) = normalize_keys(parsed);

        let alias = values.remove(EDITORS_ALIAS);
        if let Some(alias) = alias
            && values.get("editor").is_none_or(MetadataValue::is_absent)
        {
            values.insert("editor".to_string(), alias);
        }

        let dropped_keys: Vec<String> = source_keys
            .into_iter()
            .filter(|k| k != EDITORS_ALIAS && schema::field(k).is_none())
            .collect();
        for key in &dropped_keys {
            tracing::warn!(path = %path.display(), key = %key, "dropping key outside the schema");
        }

        let mut fields = Vec::with_capacity(CANONICAL_FIELDS.len());
        let mut backfilled = Vec::new();
        for spec in CANONICAL_FIELDS {
            let value = values.remove(spec.key).unwrap_or(MetadataValue::Absent);
            let mut value = match spec.shape {
                Shape::Scalar => coerce_scalar(value),
                Shape::List => coerce_list(value),
                Shape::Date => self.coerce_date(spec, value, source, path)?,
            };
            if value.is_absent() && spec.required {
                value = self.backfill(spec, path)?;
                backfilled.push(spec.key);
            }
            fields.push((spec.key, value));
        }

        Ok(Reconciled {
            fields,
            dropped_keys,
            backfilled,
        })
    }

    fn coerce_date(
        &self,
        spec: &FieldSpec,
        value: MetadataValue,
        source: &MetadataLines,
        path: &Path,
    ) -> Result<MetadataValue, KepfixError> {
        let text = match coerce_scalar(value) {
            MetadataValue::Scalar(s) => s,
            _ => return Ok(MetadataValue::Absent),
        };
        if schema::is_iso_date(&text) {
            return Ok(MetadataValue::Scalar(text));
        }
        let raw_field = source.field_text(spec.key).unwrap_or_default();
        let embedded = [text.as_str(), raw_field.as_str()]
            .into_iter()
            .flat_map(|haystack| EMBEDDED_DATE.find_iter(haystack))
            .map(|m| m.as_str())
            .find(|candidate| schema::is_iso_date(candidate));
        match embedded {
            Some(date) => Ok(MetadataValue::Scalar(date.to_string())),
            None => {
                tracing::debug!(path = %path.display(), key = spec.key, value = %text, "no date in field");
                self.history_date(spec.key, path)
            }
        }
    }

    fn backfill(&self, spec: &FieldSpec, path: &Path) -> Result<MetadataValue, KepfixError> {
        match spec.shape {
            Shape::Scalar => Ok(MetadataValue::Scalar(PLACEHOLDER.to_string())),
            Shape::List => Ok(MetadataValue::List(vec![PLACEHOLDER.to_string()])),
            Shape::Date => self.history_date(spec.key, path),
        }
    }

    fn history_date(&self, key: &str, path: &Path) -> Result<MetadataValue, KepfixError> {
        let date = match key {
            CREATION_DATE => self.history.first_added(path)?,
            LAST_UPDATED => self.history.last_touched(path)?,
            other => {
                return Err(KepfixError::SchemaCoercionFailure {
                    key: other.to_string(),
                    reason: "no history source for this date".to_string(),
                });
            }
        };
        Ok(MetadataValue::Scalar(date.format(DATE_FORMAT).to_string()))
    }
}

/// Lower-case every key; a later key replaces an earlier one it collides
/// with. Also returns the lower-cased keys in source order.
fn normalize_keys(parsed: RawMetadata) -> (FxHashMap<String, MetadataValue>, Vec<String>) {
    let mut values = FxHashMap::default();
    let mut order = Vec::with_capacity(parsed.entries.len());
    for (key, value) in parsed.entries {
        let key = key.trim().to_lowercase();
        if !order.contains(&key) {
            order.push(key.clone());
        }
        values.insert(key, value);
    }
    (values, order)
}

fn coerce_scalar(value: MetadataValue) -> MetadataValue {
    match value {
        MetadataValue::Scalar(s) if s.trim().is_empty() => MetadataValue::Absent,
        MetadataValue::List(items) => match items.into_iter().next() {
            Some(first) => coerce_scalar(MetadataValue::Scalar(first)),
            None => MetadataValue::Absent,
        },
        other => other,
    }
}

fn coerce_list(value: MetadataValue) -> MetadataValue {
    let items = match value {
        MetadataValue::Scalar(s) => vec![s],
        MetadataValue::List(items) => items,
        MetadataValue::Absent => return MetadataValue::Absent,
    };
    let items: Vec<String> = items
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect();
    if items.is_empty() {
        MetadataValue::Absent
    } else {
        MetadataValue::List(items)
    }
}

impl Reconciled {
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn validate(&self) -> Result<(), KepfixError> {
        schema::validate_structure(|key| self.get(key))
    }

    /// Canonical block. `source` is the metadata text the values came from;
    /// it decides quoting and whether an empty optional key is kept.
    pub fn to_lines(&self, source: &str) -> MetadataLines {
        let mut out = Vec::new();
        for (key, value) in &self.fields {
            match value {
                MetadataValue::Scalar(s) => out.push(format!("{}: {}", key, render_value(s, source))),
                MetadataValue::List(items) if !items.is_empty() => {
                    out.push(format!("{}:", key));
                    for item in items {
                        out.push(format!("  - {}", render_value(item, source)));
                    }
                }
                _ => {
                    if source.contains(&format!("{}:", key)) {
                        out.push(format!("{}:", key));
                    }
                }
            }
        }
        MetadataLines::new(out)
    }
}

/// Double-quote a value that was quoted in the source or that YAML would
/// otherwise misread.
pub fn render_value(value: &str, source: &str) -> String {
    let quoted = format!("\"{}\"", escape(value));
    if source.contains(&quoted) || needs_quotes(value) {
        quoted
    } else {
        value.to_string()
    }
}

/// Escapes for a double-quoted YAML scalar.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn needs_quotes(value: &str) -> bool {
    value.starts_with(['@', '[', '/'])
        || value.contains(" -")
        || value.contains(':')
        || !reads_back_plain(value)
}

/// Whether `value` written as a plain scalar parses back to the same string.
fn reads_back_plain(value: &str) -> bool {
    if value.contains(['\n', '\r']) {
        return false;
    }
    serde_yaml::from_str::<serde_yaml::Value>(&format!("v: {}\n", value))
        .ok()
        .and_then(|doc| match doc.get("v") {
            Some(serde_yaml::Value::String(s)) => Some(s == value),
            _ => None,
        })
        .unwrap_or(false)
}
