//! The fixed proposal metadata schema.
//!
//! Every key a proposal header may carry, in the order the canonical block
//! emits them, together with its expected shape and whether it is required.

use crate::core::error::KepfixError;
use chrono::NaiveDate;
use serde::Serialize;

/// Expected shape of a metadata field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    List,
    /// A scalar holding an ISO-8601 calendar date (`YYYY-MM-DD`).
    Date,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub key: &'static str,
    pub shape: Shape,
    pub required: bool,
}

/// Canonical emission order.
pub const CANONICAL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "title",
        shape: Shape::Scalar,
        required: true,
    },
    FieldSpec {
        key: "authors",
        shape: Shape::List,
        required: true,
    },
    FieldSpec {
        key: "owning-sig",
        shape: Shape::Scalar,
        required: false,
    },
    FieldSpec {
        key: "participating-sigs",
        shape: Shape::List,
        required: false,
    },
    FieldSpec {
        key: "reviewers",
        shape: Shape::List,
        required: true,
    },
    FieldSpec {
        key: "approvers",
        shape: Shape::List,
        required: true,
    },
    FieldSpec {
        key: "editor",
        shape: Shape::Scalar,
        required: false,
    },
    FieldSpec {
        key: "creation-date",
        shape: Shape::Date,
        required: true,
    },
    FieldSpec {
        key: "last-updated",
        shape: Shape::Date,
        required: true,
    },
    FieldSpec {
        key: "status",
        shape: Shape::Scalar,
        required: true,
    },
    FieldSpec {
        key: "see-also",
        shape: Shape::List,
        required: false,
    },
    FieldSpec {
        key: "replaces",
        shape: Shape::List,
        required: false,
    },
    FieldSpec {
        key: "superseded-by",
        shape: Shape::List,
        required: false,
    },
];

pub const CREATION_DATE: &str = "creation-date";
pub const LAST_UPDATED: &str = "last-updated";

/// Literal substituted for a required field with no better source of truth.
pub const PLACEHOLDER: &str = "TBD";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn field(key: &str) -> Option<&'static FieldSpec> {
    CANONICAL_FIELDS.iter().find(|f| f.key == key)
}

pub fn shape_of(key: &str) -> Option<Shape> {
    field(key).map(|f| f.shape)
}

pub fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
}

/// A single metadata value, decided from the YAML node kind at parse time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetadataValue {
    Scalar(String),
    List(Vec<String>),
    Absent,
}

impl MetadataValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, MetadataValue::Absent)
    }
}

/// Check a reconciled record against the schema.
///
/// `lookup` returns the value held for a key; keys it does not know are
/// treated as absent.
pub fn validate_structure<'a, F>(lookup: F) -> Result<(), KepfixError>
where
    F: Fn(&str) -> Option<&'a MetadataValue>,
{
    static ABSENT: MetadataValue = MetadataValue::Absent;
    for spec in CANONICAL_FIELDS {
        let value = lookup(spec.key).unwrap_or(&ABSENT);
        let violation = match (spec.shape, value) {
            (_, MetadataValue::Absent) if spec.required => Some("must have a value"),
            (_, MetadataValue::Absent) => None,
            (Shape::Scalar, MetadataValue::Scalar(s)) if s.trim().is_empty() => {
                Some("must have a value")
            }
            (Shape::Scalar, MetadataValue::Scalar(_)) => None,
            (Shape::Scalar, MetadataValue::List(_)) => Some("must be a string"),
            (Shape::Date, MetadataValue::Scalar(s)) if is_iso_date(s) => None,
            (Shape::Date, MetadataValue::Scalar(_)) => Some("must be a YYYY-MM-DD date"),
            (Shape::Date, MetadataValue::List(_)) => Some("must be a string"),
            (Shape::List, MetadataValue::List(items)) if spec.required && items.is_empty() => {
                Some("must have at least one value")
            }
            (Shape::List, MetadataValue::List(_)) => None,
            (Shape::List, MetadataValue::Scalar(_)) => Some("must be a list of strings"),
        };
        if let Some(reason) = violation {
            return Err(KepfixError::SchemaCoercionFailure {
                key: spec.key.to_string(),
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}
